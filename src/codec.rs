// 该文件是 Chejian （车检） 项目的一部分。
// src/codec.rs - 图像编解码
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

use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{ImageFormat, RgbImage};
use thiserror::Error;

/// 接受的最大图像负载（10MB）
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum CodecError {
  #[error("图像数据为空")]
  EmptyData,
  #[error("图像数据过大: {0} 字节 (上限 {1} 字节)")]
  TooLarge(usize, usize),
  #[error("base64 编码无效: {0}")]
  InvalidBase64(#[from] base64::DecodeError),
  #[error("无法识别的图像格式")]
  UnsupportedFormat,
  #[error("图像解码失败: {0}")]
  DecodeFailed(String),
  #[error("图像编码失败: {0}")]
  EncodeFailed(String),
}

/// 从魔数判断图像格式
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, CodecError> {
  if bytes.len() < 4 {
    return Err(CodecError::UnsupportedFormat);
  }

  match bytes {
    // PNG: 89 50 4E 47
    [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),
    // JPEG: FF D8 FF
    [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),
    // WebP: RIFF .... WEBP
    [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Ok(ImageFormat::WebP),
    // GIF: GIF87a 或 GIF89a
    [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(ImageFormat::Gif),
    // BMP: BM
    [0x42, 0x4D, ..] => Ok(ImageFormat::Bmp),
    _ => Err(CodecError::UnsupportedFormat),
  }
}

/// 解码原始图像字节（multipart 上传路径）
///
/// 要么完整成功，要么返回类型化错误，不会部分消费输入。
pub fn decode_image_bytes(bytes: &[u8]) -> Result<RgbImage, CodecError> {
  if bytes.is_empty() {
    return Err(CodecError::EmptyData);
  }
  if bytes.len() > MAX_IMAGE_SIZE {
    return Err(CodecError::TooLarge(bytes.len(), MAX_IMAGE_SIZE));
  }

  let format = detect_format(bytes)?;
  let image = image::load_from_memory_with_format(bytes, format)
    .map_err(|e| CodecError::DecodeFailed(e.to_string()))?;

  Ok(image.to_rgb8())
}

/// 解码 base64 文本中的图像（base64 路径）
///
/// 先做 base64 解码，再做图像解码，两步各自产生类型化错误。
pub fn decode_base64_image(base64_text: &str) -> Result<RgbImage, CodecError> {
  if base64_text.is_empty() {
    return Err(CodecError::EmptyData);
  }

  let bytes = STANDARD.decode(base64_text)?;
  decode_image_bytes(&bytes)
}

/// 把图像编码为 PNG 字节流（无论输入来源格式是什么）
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, CodecError> {
  let mut buffer = Cursor::new(Vec::new());
  image
    .write_to(&mut buffer, ImageFormat::Png)
    .map_err(|e| CodecError::EncodeFailed(e.to_string()))?;
  Ok(buffer.into_inner())
}

/// 标准 base64 文本编码，不换行
pub fn to_base64(bytes: &[u8]) -> String {
  STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
  use super::*;

  // 1x1 红色 PNG（base64）
  const TINY_PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

  #[test]
  fn decode_base64_png() {
    let image = decode_base64_image(TINY_PNG_BASE64).unwrap();
    assert_eq!(image.width(), 1);
    assert_eq!(image.height(), 1);
  }

  #[test]
  fn decode_base64_malformed_text() {
    let result = decode_base64_image("not-base64-!!");
    assert!(matches!(result, Err(CodecError::InvalidBase64(_))));
  }

  #[test]
  fn decode_base64_empty_text() {
    let result = decode_base64_image("");
    assert!(matches!(result, Err(CodecError::EmptyData)));
  }

  #[test]
  fn decode_bytes_empty() {
    let result = decode_image_bytes(&[]);
    assert!(matches!(result, Err(CodecError::EmptyData)));
  }

  #[test]
  fn decode_bytes_not_an_image() {
    let result = decode_image_bytes(b"hello, this is a plain text file\n");
    assert!(matches!(result, Err(CodecError::UnsupportedFormat)));
  }

  #[test]
  fn decode_bytes_truncated_png() {
    // PNG 魔数后紧跟垃圾数据
    let result = decode_image_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x00, 0x00, 0x00, 0x00]);
    assert!(matches!(result, Err(CodecError::DecodeFailed(_))));
  }

  #[test]
  fn decode_bytes_too_large() {
    let oversized = vec![0u8; MAX_IMAGE_SIZE + 1];
    let result = decode_image_bytes(&oversized);
    assert!(matches!(result, Err(CodecError::TooLarge(_, _))));
  }

  #[test]
  fn detect_format_magic_bytes() {
    assert!(matches!(
      detect_format(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
      Ok(ImageFormat::Png)
    ));
    assert!(matches!(
      detect_format(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]),
      Ok(ImageFormat::Jpeg)
    ));
    assert!(matches!(
      detect_format(&[0x47, 0x49, 0x46, 0x38, 0x39, 0x61]),
      Ok(ImageFormat::Gif)
    ));
    assert!(matches!(
      detect_format(&[0x00, 0x00, 0x00, 0x00]),
      Err(CodecError::UnsupportedFormat)
    ));
  }

  #[test]
  fn png_round_trip_keeps_dimensions() {
    let image = RgbImage::from_pixel(17, 9, image::Rgb([12, 200, 34]));
    let bytes = encode_png(&image).unwrap();
    let decoded = decode_image_bytes(&bytes).unwrap();
    assert_eq!(decoded.width(), 17);
    assert_eq!(decoded.height(), 9);
  }

  #[test]
  fn base64_text_has_no_line_wrapping() {
    let bytes = vec![0xAAu8; 4096];
    let text = to_base64(&bytes);
    assert!(!text.contains('\n'));
    assert!(!text.contains('\r'));
  }
}
