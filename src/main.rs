// ==========================================
// 校车线路编排系统 - 命令行入口
// ==========================================
// 用法:
//   bus-route-planner                                   列出启用车辆与时段
//   bus-route-planner <学期> <校区> <方向> <星期> <时段>   打开常规排班看板并输出载客情况
// ==========================================

use std::process::ExitCode;

use bus_route_planner::app::{get_default_db_path, AppState};
use bus_route_planner::domain::types::parse_weekday;
use bus_route_planner::{logging, Direction, RouteBoardView, RouteContext};

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", bus_route_planner::APP_NAME);
    tracing::info!("系统版本: {}", bus_route_planner::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("AppState初始化失败: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = if args.is_empty() {
        log_catalog(&state)
    } else {
        open_board(&state, &args).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn log_catalog(state: &AppState) -> anyhow::Result<()> {
    let buses = state.bus_repo.find_active(None)?;
    tracing::info!("启用车辆: {} 辆", buses.len());
    for bus in &buses {
        tracing::info!("  {} ({}) 校区={} 容量={}", bus.bus_name, bus.bus_id, bus.campus, bus.capacity);
    }

    let slots = state.time_slot_repo.find_active(None, None)?;
    tracing::info!("启用时段: {} 个", slots.len());
    for slot in &slots {
        tracing::info!(
            "  {} ({}) {} {} {}",
            slot.label,
            slot.slot_id,
            slot.campus,
            slot.direction,
            slot.base_time.format("%H:%M")
        );
    }
    Ok(())
}

async fn open_board(state: &AppState, args: &[String]) -> anyhow::Result<()> {
    let [semester, campus, direction, weekday, slot] = args else {
        anyhow::bail!("参数应为: <学期> <校区> <PICKUP|DROPOFF> <Mon..Sun> <时段ID>");
    };
    let direction: Direction = direction.parse().map_err(anyhow::Error::msg)?;
    let weekday = parse_weekday(weekday).map_err(anyhow::Error::msg)?;

    let context = RouteContext::regular(semester.as_str(), campus.as_str(), direction, weekday, slot.as_str());
    let view = state.route_api.open_board(context).await?;
    log_board(&view);
    Ok(())
}

fn log_board(view: &RouteBoardView) {
    tracing::info!(
        "学员合计 {} 人, 超载={}, 超时={}",
        view.total_students,
        view.any_capacity_exceeded,
        view.any_time_exceeded
    );
    for bus in &view.buses {
        tracing::info!(
            "  {}: {}/{} 人, {} 个线路块, 约 {} 分钟",
            bus.bus_name,
            bus.occupancy,
            bus.capacity.map_or_else(|| "-".to_string(), |c| c.to_string()),
            bus.blocks.len(),
            bus.estimated_minutes
        );
    }
}
