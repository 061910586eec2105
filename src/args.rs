// 该文件是 Chejian （车检） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;

/// Chejian 项目参数配置
///
/// 进程启动时读取一次，整个生命周期内不可变。
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型文件路径
  #[arg(long, env = "MODEL_PATH", value_name = "FILE")]
  pub model: String,

  /// 计算设备 (cpu, cuda 或 cuda:N)
  #[arg(long, env = "DEVICE", default_value = "cpu", value_name = "DEVICE")]
  pub device: String,

  /// 监听地址
  #[arg(long, env = "HOST", default_value = "0.0.0.0", value_name = "HOST")]
  pub host: String,

  /// 监听端口
  #[arg(long, env = "PORT", default_value = "8000", value_name = "PORT")]
  pub port: u16,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.25", value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.45", value_name = "THRESHOLD")]
  pub nms_threshold: f32,
}
