// ==========================================
// 集成测试公共模块
// ==========================================
// 各测试文件只用到其中一部分
#![allow(dead_code)]

pub mod mock_config;
pub mod mock_gateway;
pub mod route_test_env;
pub mod test_data_builder;
