use std::time::Instant;

use csvdb_core::{DataSourceOptions, ImportError, ImportEvent, ImportObserver, TracingObserver, run_import};

use crate::{ImportConfig, MessageKind, ProgressMessage, print_completed, print_progress, print_status};

/// 把导入事件同时写入日志和 stdout
struct TaskObserver {
    start: Instant,
    inner: TracingObserver,
}

impl TaskObserver {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            inner: TracingObserver,
        }
    }
}

impl ImportObserver for TaskObserver {
    fn notify(
        &mut self,
        event: &ImportEvent,
    ) {
        self.inner.notify(event);

        match event {
            ImportEvent::ChunkWritten {
                index,
                first_line,
                rows,
                total_rows,
            } => {
                let elapsed = self.start.elapsed().as_secs_f64();
                let speed = if elapsed > 0.0 {
                    *total_rows as f64 / elapsed
                } else {
                    0.0
                };
                print_progress(ProgressMessage {
                    kind: MessageKind::Progress,
                    data: serde_json::json!({
                        "chunk": index,
                        "first_line": first_line,
                        "chunk_rows": rows,
                        "imported_rows": total_rows,
                        "speed": format!("{:.0}", speed),
                        "elapsed_seconds": format!("{:.1}", elapsed),
                    }),
                });
            }
            ImportEvent::Connected { .. }
            | ImportEvent::TableDropped { .. }
            | ImportEvent::TableNotFound { .. }
            | ImportEvent::TableCreated { .. } => print_status(&event.message()),
            // 失败由 main 统一输出
            _ => {}
        }
    }
}

/// CSV 导入任务
pub fn run(
    source: &DataSourceOptions,
    config: &ImportConfig,
) -> Result<(), ImportError> {
    tracing::info!("开始导入任务");
    tracing::debug!(
        "导入配置: file={}, table={}, delimiter={:?}, chunk_size={}, insert_batch={}, drop_existing={}",
        config.file.display(),
        config.table,
        config.delimiter,
        config.chunk_size,
        config.insert_batch,
        config.drop_existing
    );

    let plan = config.plan()?;
    let mut observer = TaskObserver::new();
    let summary = run_import(source, &plan, &mut observer)?;

    print_completed(serde_json::json!({
        "status": "success",
        "table": summary.table,
        "total_rows": summary.total_rows,
        "chunks": summary.chunks,
        "created": summary.created,
        "elapsed_seconds": format!("{:.1}", summary.elapsed.as_secs_f64()),
    }));
    Ok(())
}
