// 该文件是 Chejian （车检） 项目的一部分。
// src/visualizer.rs - 检测结果可视化
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::detector::class_name;
use crate::wire::Detection;

/// 可视化工具
pub struct Visualizer {
  /// 字体
  font: FontArc,
  /// 字体大小
  font_scale: PxScale,
  /// 边界框颜色映射
  colors: Vec<Rgb<u8>>,
}

impl Default for Visualizer {
  fn default() -> Self {
    Self::new()
  }
}

impl Visualizer {
  /// 创建一个新的可视化工具
  pub fn new() -> Self {
    // 使用内置的默认字体数据
    let font_data = include_bytes!("../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data).expect("无法加载字体");

    // 生成 80 种不同的颜色（对应 COCO 数据集的 80 个类别）
    let colors: Vec<Rgb<u8>> = (0..80)
      .map(|i| {
        let hue = (i as f32 / 80.0) * 360.0;
        Self::hsv_to_rgb(hue, 0.8, 0.9)
      })
      .collect();

    Self {
      font,
      font_scale: PxScale::from(16.0),
      colors,
    }
  }

  /// HSV 转 RGB
  fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
      (c, x, 0.0)
    } else if h < 120.0 {
      (x, c, 0.0)
    } else if h < 180.0 {
      (0.0, c, x)
    } else if h < 240.0 {
      (0.0, x, c)
    } else if h < 300.0 {
      (x, 0.0, c)
    } else {
      (c, 0.0, x)
    };

    Rgb([
      ((r + m) * 255.0) as u8,
      ((g + m) * 255.0) as u8,
      ((b + m) * 255.0) as u8,
    ])
  }

  /// 在原图的副本上叠加检测结果，不修改调用者的图像
  ///
  /// 返回的图像与输入具有相同的像素尺寸。
  pub fn render(&self, image: &RgbImage, detections: &[Detection]) -> RgbImage {
    let mut annotated = image.clone();
    self.draw_detections(&mut annotated, detections);
    annotated
  }

  /// 在图像上绘制检测结果
  pub fn draw_detections(&self, image: &mut RgbImage, detections: &[Detection]) {
    for detection in detections {
      let color = self.colors[detection.class_id as usize % self.colors.len()];

      // 裁剪到图像边界后绘制边界框
      let x = detection.bbox[0].max(0);
      let y = detection.bbox[1].max(0);
      let width = (detection.bbox[2].min(image.width() as i32) - x).max(0) as u32;
      let height = (detection.bbox[3].min(image.height() as i32) - y).max(0) as u32;

      if width > 0 && height > 0 {
        let rect = Rect::at(x, y).of_size(width, height);
        draw_hollow_rect_mut(image, rect, color);

        // 绘制第二个边框以增加可见度
        if x > 0 && y > 0 && width > 2 && height > 2 {
          let inner_rect =
            Rect::at(x + 1, y + 1).of_size(width.saturating_sub(2), height.saturating_sub(2));
          draw_hollow_rect_mut(image, inner_rect, color);
        }
      }

      // 绘制标签
      let label = format!("{}: {:.1}", class_name(detection.class_id), detection.score);
      let text_y = (y - 20).max(0);

      draw_text_mut(image, color, x, text_y, self.font_scale, &self.font, &label);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn detection(bbox: [i32; 4], score: f32, class_id: u32) -> Detection {
    Detection {
      bbox,
      score,
      class_id,
    }
  }

  #[test]
  fn render_keeps_dimensions() {
    let image = RgbImage::from_pixel(64, 48, Rgb([10, 10, 10]));
    let annotated = Visualizer::new().render(&image, &[detection([5, 5, 30, 40], 0.9, 2)]);
    assert_eq!(annotated.width(), 64);
    assert_eq!(annotated.height(), 48);
  }

  #[test]
  fn render_does_not_mutate_input() {
    let image = RgbImage::from_pixel(64, 48, Rgb([10, 10, 10]));
    let before = image.clone();
    let _ = Visualizer::new().render(&image, &[detection([5, 5, 30, 40], 0.9, 2)]);
    assert_eq!(image, before);
  }

  #[test]
  fn render_draws_something() {
    let image = RgbImage::from_pixel(64, 48, Rgb([10, 10, 10]));
    let annotated = Visualizer::new().render(&image, &[detection([5, 5, 30, 40], 0.9, 2)]);
    assert_ne!(annotated, image);
  }

  #[test]
  fn out_of_bounds_box_is_clipped() {
    let image = RgbImage::from_pixel(32, 32, Rgb([0, 0, 0]));
    // 不应 panic
    let annotated = Visualizer::new().render(&image, &[detection([-10, -10, 100, 100], 0.5, 0)]);
    assert_eq!(annotated.dimensions(), (32, 32));
  }
}
