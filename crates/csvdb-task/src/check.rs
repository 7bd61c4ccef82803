use std::time::Instant;

use csvdb_core::{DataSourceOptions, ImportError, TracingObserver, check_connection};

use crate::print_completed;

/// 测试连接任务
pub fn run(source: &DataSourceOptions) -> Result<(), ImportError> {
    tracing::info!("开始测试连接: {}", source.kind().label());
    let start = Instant::now();

    check_connection(source, &mut TracingObserver)?;

    print_completed(serde_json::json!({
        "status": "success",
        "endpoint": source.endpoint(),
        "elapsed_seconds": format!("{:.1}", start.elapsed().as_secs_f64()),
    }));
    Ok(())
}
