// 该文件是 Chejian （车检） 项目的一部分。
// src/server/mod.rs - HTTP 服务
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

mod handlers;
pub use handlers::ApiError;

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::codec::MAX_IMAGE_SIZE;
use crate::detector::Detector;
use crate::visualizer::Visualizer;

/// 请求体上限：图像上限之外留出 multipart 边界与 base64 文本
/// （比原始字节多约三分之一）的开销；图像本身的大小
/// 由编解码层校验并报告类型化错误。
const BODY_LIMIT: usize = MAX_IMAGE_SIZE + MAX_IMAGE_SIZE / 2;

/// 各请求处理器共享的只读状态
///
/// 检测器在启动时构建一次，经由 `Arc` 注入；
/// 测试可以用确定性的假实现替换它。
#[derive(Clone)]
pub struct AppState {
  pub detector: Arc<dyn Detector>,
  pub visualizer: Arc<Visualizer>,
}

impl AppState {
  pub fn new(detector: Arc<dyn Detector>) -> Self {
    Self {
      detector,
      visualizer: Arc::new(Visualizer::new()),
    }
  }
}

/// 组装路由
pub fn build_router(state: AppState) -> Router {
  Router::new()
    .route("/", get(handlers::index))
    .route("/predict/", post(handlers::predict))
    .route("/predict_base64/", post(handlers::predict_base64))
    .layer(DefaultBodyLimit::max(BODY_LIMIT))
    .layer(
      CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// 绑定地址并运行服务，直到进程退出
pub async fn run(state: AppState, host: &str, port: u16) -> Result<()> {
  let app = build_router(state);
  let addr = format!("{}:{}", host, port);
  let listener = tokio::net::TcpListener::bind(&addr).await?;
  info!("HTTP 服务监听于 {}", addr);
  axum::serve(listener, app).await?;
  Ok(())
}
