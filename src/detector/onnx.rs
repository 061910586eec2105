// 该文件是 Chejian （车检） 项目的一部分。
// src/detector/onnx.rs - ONNX YOLO 检测器
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

use std::sync::Mutex;

use image::RgbImage;
use ndarray::{ArrayViewD, Axis, IxDyn, s};
use ort::execution_providers::CUDA as CUDAExecutionProvider;
use ort::session::Session;
use ort::value::Value;
use tracing::{debug, info};

use super::{Detector, DetectorError, RawDetection};

/// YOLO 模型输入尺寸（正方形）
const YOLO_INPUT_SIZE: u32 = 640;

/// 基于 ONNX Runtime 的 YOLO 检测器
///
/// `Session::run` 需要独占访问，因此推理在内部经由互斥锁串行化：
/// 每个进程同一时刻只有一次在途推理，并发请求在锁上排队。
pub struct OnnxDetector {
  session: Mutex<Session>,
  input_size: u32,
  confidence_threshold: f32,
  nms_threshold: f32,
}

impl OnnxDetector {
  /// 从模型文件与计算设备创建检测器，进程启动时调用一次
  pub fn new(
    model_path: &str,
    device: &str,
    confidence_threshold: f32,
    nms_threshold: f32,
  ) -> Result<Self, DetectorError> {
    let mut builder = Session::builder()?
      .with_intra_threads(4)
      .map_err(ort::Error::from)?;

    // 设备形如 "cpu"、"cuda" 或 "cuda:0"
    if device.starts_with("cuda") {
      info!("注册 CUDA 执行提供器: {}", device);
      builder = builder
        .with_execution_providers([CUDAExecutionProvider::default().build()])
        .map_err(ort::Error::from)?;
    }

    let model_bytes = std::fs::read(model_path)
      .map_err(|e| DetectorError::ModelLoad(format!("{}: {}", model_path, e)))?;
    let session = builder
      .commit_from_memory(&model_bytes)
      .map_err(|e| DetectorError::ModelLoad(e.to_string()))?;

    info!("模型加载完成: {}", model_path);

    Ok(Self {
      session: Mutex::new(session),
      input_size: YOLO_INPUT_SIZE,
      confidence_threshold,
      nms_threshold,
    })
  }

  /// 预处理：缩放到模型输入尺寸并转为 NCHW f32 张量
  fn preprocess(&self, image: &RgbImage) -> Vec<f32> {
    let resized = image::imageops::resize(
      image,
      self.input_size,
      self.input_size,
      image::imageops::FilterType::Triangle,
    );

    let size = self.input_size as usize;
    let mut input = vec![0f32; 3 * size * size];
    for (x, y, pixel) in resized.enumerate_pixels() {
      let idx = y as usize * size + x as usize;
      input[idx] = pixel[0] as f32 / 255.0;
      input[size * size + idx] = pixel[1] as f32 / 255.0;
      input[2 * size * size + idx] = pixel[2] as f32 / 255.0;
    }
    input
  }

  /// 后处理：解析 [1, 4+nc, anchors] 布局的输出，阈值过滤后做 NMS
  fn postprocess(
    &self,
    dims: &[usize],
    data: &[f32],
    original_width: f32,
    original_height: f32,
  ) -> Result<Vec<RawDetection>, DetectorError> {
    if dims.len() != 3 || dims[1] <= 4 {
      return Err(DetectorError::OutputShape(format!("{:?}", dims)));
    }

    let view = ArrayViewD::from_shape(IxDyn(dims), data)
      .map_err(|e| DetectorError::OutputShape(e.to_string()))?;
    let view = view.index_axis(Axis(0), 0);

    let num_candidates = view.shape()[1];
    let scale_x = original_width / self.input_size as f32;
    let scale_y = original_height / self.input_size as f32;

    let mut detections = Vec::new();

    for i in 0..num_candidates {
      let scores = view.slice(s![4.., i]);
      let (class_id, &max_score) = scores
        .indexed_iter()
        .max_by(|(_, a), (_, b)| a.total_cmp(*b))
        .ok_or_else(|| DetectorError::OutputShape("空类别维度".to_string()))?;

      if max_score < self.confidence_threshold {
        continue;
      }

      let cx = view[[0, i]];
      let cy = view[[1, i]];
      let w = view[[2, i]];
      let h = view[[3, i]];

      // 转角点坐标，缩放回原图并裁剪到图像边界
      let x1 = ((cx - w / 2.0) * scale_x).clamp(0.0, original_width);
      let y1 = ((cy - h / 2.0) * scale_y).clamp(0.0, original_height);
      let x2 = ((cx + w / 2.0) * scale_x).clamp(0.0, original_width);
      let y2 = ((cy + h / 2.0) * scale_y).clamp(0.0, original_height);

      detections.push(RawDetection {
        bbox: [x1, y1, x2, y2],
        score: max_score,
        class_id: class_id as u32,
      });
    }

    Ok(self.nms(detections))
  }

  /// 非极大值抑制
  fn nms(&self, mut detections: Vec<RawDetection>) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut result = Vec::new();

    while !detections.is_empty() {
      let best = detections.remove(0);
      detections.retain(|det| {
        if det.class_id != best.class_id {
          return true;
        }
        iou(&best.bbox, &det.bbox) < self.nms_threshold
      });
      result.push(best);
    }

    result
  }
}

/// 计算两个角点格式边界框的 IoU
fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]) * (a[3] - a[1]);
  let area_b = (b[2] - b[0]) * (b[3] - b[1]);
  let union = area_a + area_b - intersection;

  if union > 0.0 { intersection / union } else { 0.0 }
}

impl Detector for OnnxDetector {
  fn detect(&self, image: &RgbImage) -> Result<Vec<RawDetection>, DetectorError> {
    let original_width = image.width() as f32;
    let original_height = image.height() as f32;

    let input = self.preprocess(image);
    let shape = vec![
      1i64,
      3,
      self.input_size as i64,
      self.input_size as i64,
    ];
    let input_tensor = Value::from_array((shape, input))?;

    let mut session = self.session.lock().map_err(|_| DetectorError::Poisoned)?;
    let outputs = session.run(ort::inputs!["images" => input_tensor])?;

    let output = outputs
      .get("output0")
      .or_else(|| outputs.get("output"))
      .ok_or_else(|| DetectorError::OutputShape("模型缺少输出节点".to_string()))?;
    let (shape, data) = output.try_extract_tensor::<f32>()?;
    let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();

    let detections = self.postprocess(&dims, data, original_width, original_height)?;
    debug!("检测到 {} 个对象", detections.len());

    Ok(detections)
  }
}
