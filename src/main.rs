// ==========================================
// 仓储决策核心 - 主入口
// ==========================================
// 运行形态: 行分隔 JSON 服务
// 输入: stdin 每行一个请求 {"op": "...", "payload": {...}}
// 输出: stdout 每行一个响应 {"ok": ...} / {"error": {...}}
// ==========================================

use std::io::{BufRead, Write};

use wms_core::app::{get_default_db_path, AppState};

fn main() -> anyhow::Result<()> {
    // 初始化日志系统（日志走 stderr，不污染协议输出）
    wms_core::logging::init();

    tracing::info!("==================================================");
    tracing::info!("仓储决策核心 - 库存台账与拣选路径引擎");
    tracing::info!("系统版本: {}", wms_core::VERSION);
    tracing::info!("==================================================");

    // 数据库路径: 第一个命令行参数，缺省取平台数据目录
    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).map_err(|e| anyhow::anyhow!(e))?;

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let response = state.dispatcher.dispatch_json(trimmed);
        writeln!(out, "{}", response)?;
        out.flush()?;
    }

    tracing::info!("输入流结束, 退出");
    Ok(())
}
