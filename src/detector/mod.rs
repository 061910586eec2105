// 该文件是 Chejian （车检） 项目的一部分。
// src/detector/mod.rs - 检测器抽象
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

mod onnx;
pub use onnx::OnnxDetector;

use image::RgbImage;
use thiserror::Error;

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// 按类别索引取名称，超出范围返回 "unknown"
pub fn class_name(class_id: u32) -> &'static str {
  COCO_CLASSES.get(class_id as usize).copied().unwrap_or("unknown")
}

/// 检测器原始输出
///
/// 坐标为原图像素坐标系下的浮点角点，置信度在 [0,1] 区间。
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
  /// [x1, y1, x2, y2]
  pub bbox: [f32; 4],
  /// 置信度
  pub score: f32,
  /// 类别索引
  pub class_id: u32,
}

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("模型加载失败: {0}")]
  ModelLoad(String),
  #[error("推理失败: {0}")]
  Inference(#[from] ort::Error),
  #[error("输出形状错误: {0}")]
  OutputShape(String),
  #[error("推理会话锁中毒")]
  Poisoned,
}

/// 检测能力边界
///
/// 实现必须支持并发调用；若底层运行时不是线程安全的，
/// 实现内部需要自行串行化（见 [`OnnxDetector`]）。
pub trait Detector: Send + Sync {
  fn detect(&self, image: &RgbImage) -> Result<Vec<RawDetection>, DetectorError>;
}
