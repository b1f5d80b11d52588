// ==========================================
// 校车线路编排系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::RouteApi;
use crate::config::config_manager::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection, read_schema_version};
use crate::engine::eligibility::EligibilityResolver;
use crate::engine::events::{NoOpEventPublisher, RouteEventPublisher};
use crate::engine::repositories::RouteRepositories;
use crate::repository::{BusRepository, StudentRepository, TimeSlotRepository};

/// 应用状态
///
/// 所有仓储共享同一个数据库连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 线路看板API
    pub route_api: Arc<RouteApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 车辆目录仓储
    pub bus_repo: Arc<BusRepository>,

    /// 时段仓储
    pub time_slot_repo: Arc<TimeSlotRepository>,

    /// 学员仓储 (名册/课表/接送事件)
    pub student_repo: Arc<StudentRepository>,

    /// 线路编排仓储集合
    pub repositories: RouteRepositories,
}

impl AppState {
    /// 创建新的AppState实例 (不发布事件)
    ///
    /// # 说明
    /// 1. 打开数据库并初始化表结构
    /// 2. 初始化所有Repository
    /// 3. 创建API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_publisher(db_path, Arc::new(NoOpEventPublisher))
    }

    /// 创建AppState, 看板事件发往指定发布者
    pub fn with_publisher(
        db_path: String,
        publisher: Arc<dyn RouteEventPublisher>,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库表结构初始化失败: {}", e))?;
        match read_schema_version(&conn) {
            Ok(Some(version)) => tracing::debug!("数据库 schema_version = {}", version),
            Ok(None) => tracing::warn!("数据库缺少 schema_version 记录"),
            Err(e) => tracing::warn!("读取 schema_version 失败: {}", e),
        }
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let bus_repo = Arc::new(BusRepository::new(conn.clone()));
        let time_slot_repo = Arc::new(TimeSlotRepository::new(conn.clone()));
        let student_repo = Arc::new(StudentRepository::new(conn.clone()));
        let repositories = RouteRepositories::from_connection(conn.clone());
        let config_manager = Arc::new(ConfigManager::from_connection(conn));

        // ==========================================
        // 初始化Engine / API层
        // ==========================================
        let resolver = EligibilityResolver::new(student_repo.clone());
        let route_api = Arc::new(RouteApi::new(
            Arc::new(repositories.clone()),
            resolver,
            config_manager.clone(),
            publisher,
            repositories.change_log_repo.clone(),
        ));

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            route_api,
            config_manager,
            bus_repo,
            time_slot_repo,
            student_repo,
            repositories,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先使用环境变量 BUS_ROUTE_PLANNER_DB_PATH, 否则放在用户数据目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("BUS_ROUTE_PLANNER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./bus_route_planner.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("bus-route-planner-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("bus-route-planner");
        }

        std::fs::create_dir_all(&path).ok();
        path = path.join("bus_route_planner.db");
    }

    path.to_string_lossy().to_string()
}
