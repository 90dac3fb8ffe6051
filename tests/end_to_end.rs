//! End-to-end scenarios spanning the RIFX reader, AEP parser, analyzer, and catalog
//! store together.

use aep_catalog::aep;
use aep_catalog::analyzer;
use aep_catalog::catalog::{CatalogStore, ProjectMetadata};
use aep_catalog::config::CatalogConfig;

fn block(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(kind);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    out
}

fn rifx_doc(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"RIFX");
    out.extend_from_slice(&((body.len() as u32) + 4).to_be_bytes());
    out.extend_from_slice(b"Egg!");
    out.extend_from_slice(body);
    out
}

fn composition_project_bytes(name: &str, width: u16, height: u16) -> Vec<u8> {
    let mut cdta_payload = Vec::new();
    cdta_payload.extend_from_slice(&width.to_be_bytes());
    cdta_payload.extend_from_slice(&height.to_be_bytes());
    cdta_payload.extend_from_slice(&24.0f32.to_be_bytes());
    cdta_payload.extend_from_slice(&10.0f64.to_be_bytes());
    cdta_payload.extend_from_slice(&[0, 0, 0]);

    let idta = block(b"idta", &[0, 0, 0, 1, 0x04, 0, 0, 0]);
    let name_block = block(b"Utf8", name.as_bytes());
    let cdta = block(b"cdta", &cdta_payload);

    let mut body = Vec::new();
    body.extend_from_slice(&idta);
    body.extend_from_slice(&name_block);
    body.extend_from_slice(&cdta);
    rifx_doc(&body)
}

async fn fresh_store() -> CatalogStore {
    let config = CatalogConfig {
        database_url: "sqlite::memory:".to_string(),
        ..CatalogConfig::default()
    };
    CatalogStore::connect(config).await.unwrap()
}

#[tokio::test]
async fn parse_analyze_store_get_round_trip() {
    let bytes = composition_project_bytes("Main Comp", 1920, 1080);
    let project = aep::parse(&bytes).unwrap();
    let analysis = analyzer::analyze(&project);

    let store = fresh_store().await;
    let metadata = ProjectMetadata {
        file_path: "/projects/main.aep".to_string(),
        file_name: "main.aep".to_string(),
        file_size: bytes.len() as u64,
        project,
        analysis,
    };
    let id = store.store_project(metadata).await.unwrap();
    let record = store.get_project(id).await.unwrap();

    assert_eq!(record.compositions.len(), 1);
    assert_eq!(record.compositions[0].width, 1920);
    assert!(record.categories.contains(&"HD".to_string()));
}

#[tokio::test]
async fn repeated_upserts_do_not_duplicate_rows() {
    let store = fresh_store().await;

    for _ in 0..3 {
        let bytes = composition_project_bytes("Main Comp", 1920, 1080);
        let project = aep::parse(&bytes).unwrap();
        let analysis = analyzer::analyze(&project);
        store
            .store_project(ProjectMetadata {
                file_path: "/projects/main.aep".to_string(),
                file_name: "main.aep".to_string(),
                file_size: bytes.len() as u64,
                project,
                analysis,
            })
            .await
            .unwrap();
    }

    let rows = sqlx::query("SELECT COUNT(*) as c FROM projects")
        .fetch_one(store.pool())
        .await
        .unwrap();
    let count: i64 = sqlx::Row::get(&rows, "c");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn similar_ranks_shared_resolution_and_tags_higher() {
    let store = fresh_store().await;

    let hd_bytes_a = composition_project_bytes("A", 1920, 1080);
    let hd_bytes_b = composition_project_bytes("B", 1920, 1080);
    let sd_bytes = composition_project_bytes("C", 320, 240);

    let id_a = store_one(&store, &hd_bytes_a, "/a.aep").await;
    let id_b = store_one(&store, &hd_bytes_b, "/b.aep").await;
    let _id_c = store_one(&store, &sd_bytes, "/c.aep").await;

    let results = store.similar(id_a, None).await.unwrap();
    let b_result = results.iter().find(|r| r.project_id == id_b).unwrap();
    let others_max = results
        .iter()
        .filter(|r| r.project_id != id_b)
        .map(|r| r.score)
        .fold(0.0_f64, f64::max);

    assert!(b_result.score >= others_max);
}

async fn store_one(store: &CatalogStore, bytes: &[u8], path: &str) -> i64 {
    let project = aep::parse(bytes).unwrap();
    let analysis = analyzer::analyze(&project);
    store
        .store_project(ProjectMetadata {
            file_path: path.to_string(),
            file_name: path.to_string(),
            file_size: bytes.len() as u64,
            project,
            analysis,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn parsing_the_same_bytes_twice_is_deterministic() {
    let bytes = composition_project_bytes("Repeatable", 1280, 720);
    let first = aep::parse(&bytes).unwrap();
    let second = aep::parse(&bytes).unwrap();
    assert_eq!(first.fingerprint, second.fingerprint);
}
