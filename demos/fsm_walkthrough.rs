//! fsm_walkthrough - 文件存储完整流程演示
//!
//! 1. 用户进入表单流程，逐步写入状态与数据
//! 2. 重新打开同一个文件，确认数据已持久化
//! 3. 结束流程后，会话从存储中自动删除

use fsm_storage::prelude::*;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // 每次运行都从空文件开始
    let store_path = std::env::temp_dir().join("fsm-storage-demo").join("storage_data.json");
    let _ = std::fs::remove_file(&store_path);

    let form = StatesGroup::new("Form", ["name", "age"]);
    let storage = FileStorage::builder(&store_path)
        .state_policy(form)
        .pretty(true)
        .build();
    let addr = Address::new(100, 7);
    assert_eq!(storage.conversation_count().await, 0, "旧文件未清理");

    // ── Part 1: 收集数据 ─────────────────────────────────────────────────────
    storage.set_state(&addr, Some("name")).await?;
    storage
        .update_data(&addr, json!({"name": "Ann"}).as_object().cloned().unwrap_or_default())
        .await?;
    storage.set_state(&addr, Some("age")).await?;
    storage
        .update_data_with(&addr, Data::new(), vec![("age".to_string(), json!(31))])
        .await?;

    println!("state  = {:?}", storage.get_state(&addr, None).await?);
    println!("data   = {}", serde_json::Value::Object(storage.get_data(&addr).await?));

    // ── Part 2: 重新打开文件 ─────────────────────────────────────────────────
    let reopened = FileStorage::new(&store_path);
    println!(
        "reopened: {} conversation(s), state = {:?}",
        reopened.conversation_count().await,
        reopened.get_state(&addr, None).await?
    );

    // ── Part 3: 结束流程 ─────────────────────────────────────────────────────
    storage.finish(&addr).await?;
    println!(
        "after finish: {} conversation(s), state = {:?}",
        storage.conversation_count().await,
        storage.get_state(&addr, Some("idle")).await?
    );

    storage.close().await?;
    storage.wait_closed().await?;
    Ok(())
}
