// 该文件是 Chejian （车检） 项目的一部分。
// src/main.rs - 项目主程序
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

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use chejian::args::Args;
use chejian::detector::OnnxDetector;
use chejian::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("计算设备: {}", args.device);
  info!("监听地址: {}:{}", args.host, args.port);

  info!("正在加载模型...");
  let detector = OnnxDetector::new(
    &args.model,
    &args.device,
    args.confidence,
    args.nms_threshold,
  )?;

  let state = AppState::new(Arc::new(detector));
  server::run(state, &args.host, args.port).await
}
