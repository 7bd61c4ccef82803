use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

/// 生成一个分号分隔的示例文件并导入到 SQLite
fn import_clientes() {
    let task_dir = PathBuf::from("/tmp/csvdb-tasks/import-clientes");
    let input_file = task_dir.join("clientes.csv");
    let database = PathBuf::from("/tmp/csvdb-clientes.db");

    // 清除上次任务的信息
    if task_dir.exists() {
        fs::remove_dir_all(&task_dir).unwrap();
    }
    fs::create_dir_all(&task_dir).unwrap();

    let mut data = String::from("id;nome;telefone;cep\n");
    for i in 1..=25_000 {
        data.push_str(&format!("{i};cliente {i};(11) 9{:04}-{:04};0{:07}\n", i % 10_000, i % 7_919, i));
    }
    fs::write(&input_file, data).unwrap();

    let config = json!({
        "task_id": "import-clientes-001",
        "operation": "import",
        "created_at": "2026-01-05T10:00:00Z",
        "source": {
            "SQLite": { "filepath": database }
        },
        "import": {
            "file": input_file,
            "table": "clientes",
            "chunk_size": 10000,
            "text_columns": ["cep"],
            "transforms": [
                { "column": "telefone", "kind": "digits_only" }
            ]
        }
    });

    fs::write(
        task_dir.join("config.json"),
        serde_json::to_string_pretty(&config).unwrap(),
    )
    .unwrap();

    println!("配置文件已创建: {:?}/config.json", task_dir);
    println!("正在执行任务...\n");

    let status = Command::new("cargo")
        .args(["run", "-p", "csvdb-task", "--", "--task-dir"])
        .arg(&task_dir)
        .status()
        .expect("创建任务失败");

    if status.success() {
        println!("\n✓ 任务执行成功");
    } else {
        println!("\n✗ 任务执行失败");
    }
}

fn main() {
    println!("=== csvdb-task 导入示例 ===\n");
    import_clientes();
    println!();
    println!("注意:");
    println!("  1. 每次运行会先删除 clientes 表再导入");
    println!("  2. 任务日志保存在 /tmp/csvdb-tasks/import-clientes/task.log");
}
