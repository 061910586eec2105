// 该文件是 Chejian （车检） 项目的一部分。
// src/server/handlers.rs - 请求处理器
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

use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use image::RgbImage;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use super::AppState;
use crate::codec::{self, CodecError};
use crate::detector::DetectorError;
use crate::wire::{self, DetectionResult};

/// 处理器边界的错误分类
///
/// 所有失败都在这里被翻译成 HTTP 状态码加 `{"detail": ...}` 响应体，
/// 不会有未处理的故障传播到传输层。
#[derive(Error, Debug)]
pub enum ApiError {
  #[error("上传的文件不是图像: {0}")]
  UnsupportedMediaType(String),
  #[error("无效的图像: {0}")]
  InvalidImage(String),
  #[error("无效的 base64 负载: {0}")]
  InvalidEncoding(String),
  #[error("负载过大: {0}")]
  PayloadTooLarge(String),
  #[error("检测失败: {0}")]
  Detector(String),
  #[error("内部错误: {0}")]
  Internal(String),
}

impl From<CodecError> for ApiError {
  fn from(err: CodecError) -> Self {
    match err {
      CodecError::InvalidBase64(e) => ApiError::InvalidEncoding(e.to_string()),
      CodecError::EncodeFailed(e) => ApiError::Internal(e),
      too_large @ CodecError::TooLarge(_, _) => ApiError::PayloadTooLarge(too_large.to_string()),
      other => ApiError::InvalidImage(other.to_string()),
    }
  }
}

impl From<DetectorError> for ApiError {
  fn from(err: DetectorError) -> Self {
    ApiError::Detector(err.to_string())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::UnsupportedMediaType(_)
      | ApiError::InvalidImage(_)
      | ApiError::InvalidEncoding(_) => StatusCode::BAD_REQUEST,
      ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
      ApiError::Detector(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!("请求失败 ({}): {}", status, self);
    (status, Json(json!({ "detail": self.to_string() }))).into_response()
  }
}

/// GET / - 返回图像上传页面
pub async fn index() -> Html<&'static str> {
  Html(include_str!("../../static/upload.html"))
}

/// POST /predict/ - 处理 multipart 表单上传的图像
///
/// 流程：content-type 校验 → 解码 → 检测 → 归一化 → 叠加绘制 →
/// PNG 编码 → base64。客户端输入错误返回 400，其余失败返回 500。
pub async fn predict(
  State(state): State<AppState>,
  mut multipart: Multipart,
) -> Result<Json<DetectionResult>, ApiError> {
  let mut file = None;

  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
  {
    if field.name() == Some("file") {
      let content_type = field.content_type().map(|s| s.to_string());
      let file_name = field.file_name().map(|s| s.to_string());
      let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
      info!(
        "收到上传文件: {}, 大小: {} 字节",
        file_name.as_deref().unwrap_or("<未命名>"),
        data.len()
      );
      file = Some((content_type, data));
      break;
    }
  }

  let (content_type, data) =
    file.ok_or_else(|| ApiError::UnsupportedMediaType("multipart 表单缺少 file 字段".into()))?;

  match content_type.as_deref() {
    Some(ct) if ct.starts_with("image/") => {}
    other => {
      return Err(ApiError::UnsupportedMediaType(format!(
        "content-type 为 {}",
        other.unwrap_or("<空>")
      )));
    }
  }

  let image = codec::decode_image_bytes(&data)?;
  run_pipeline(&state, image)
}

#[derive(Debug, Deserialize)]
pub struct PredictBase64Request {
  pub image_base64: String,
}

/// POST /predict_base64/ - 处理 base64 编码的图像
///
/// 流程：base64 解码 → 图像解码 → 检测 → 归一化 → 叠加绘制 →
/// PNG 编码 → base64。客户端输入错误（base64 或图像解码失败）
/// 与 /predict/ 一致地返回 400。
pub async fn predict_base64(
  State(state): State<AppState>,
  Json(request): Json<PredictBase64Request>,
) -> Result<Json<DetectionResult>, ApiError> {
  let image = codec::decode_base64_image(&request.image_base64)?;
  run_pipeline(&state, image)
}

/// 两个入口共用的检测流水线，响应是输入图像加不可变检测器的纯函数
fn run_pipeline(state: &AppState, image: RgbImage) -> Result<Json<DetectionResult>, ApiError> {
  let raw = state.detector.detect(&image)?;
  let detections = wire::normalize(&raw);

  let annotated = state.visualizer.render(&image, &detections);
  let png = codec::encode_png(&annotated)?;
  let image_base64 = codec::to_base64(&png);

  info!("检测完成: {} 个对象", detections.len());

  Ok(Json(DetectionResult {
    result: detections,
    image: image_base64,
  }))
}
