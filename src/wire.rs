// 该文件是 Chejian （车检） 项目的一部分。
// src/wire.rs - 线上数据格式与归一化
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

use serde::Serialize;

use crate::detector::RawDetection;

/// 归一化后的单个检测结果
///
/// 坐标为整数像素角点，置信度固定保留一位小数
/// （有意的精度选择，客户端依赖该格式）。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  /// [x1, y1, x2, y2]
  #[serde(rename = "box")]
  pub bbox: [i32; 4],
  /// 置信度，0.1 的整数倍
  pub score: f32,
  /// 类别索引
  #[serde(rename = "class")]
  pub class_id: u32,
}

/// 两个入口共用的唯一成功响应负载
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
  /// 检测结果列表，保持检测器原始输出顺序
  pub result: Vec<Detection>,
  /// 叠加了边界框的 PNG 图像（base64 文本）
  pub image: String,
}

/// 把检测器原始输出逐一转换为线上格式
///
/// 坐标向零截断为整数，置信度四舍五入到一位小数。
/// 一比一映射：不过滤、不去重、不做阈值筛选（阈值属于检测器职责），
/// 数量与顺序与输入完全一致。
pub fn normalize(raw: &[RawDetection]) -> Vec<Detection> {
  raw
    .iter()
    .map(|det| Detection {
      bbox: [
        det.bbox[0] as i32,
        det.bbox[1] as i32,
        det.bbox[2] as i32,
        det.bbox[3] as i32,
      ],
      score: (det.score * 10.0).round() / 10.0,
      class_id: det.class_id,
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn raw(bbox: [f32; 4], score: f32, class_id: u32) -> RawDetection {
    RawDetection {
      bbox,
      score,
      class_id,
    }
  }

  #[test]
  fn keeps_count_and_order() {
    let input = vec![
      raw([0.0, 0.0, 1.0, 1.0], 0.3, 7),
      raw([2.0, 2.0, 3.0, 3.0], 0.9, 1),
      raw([4.0, 4.0, 5.0, 5.0], 0.5, 7),
    ];
    let output = normalize(&input);
    assert_eq!(output.len(), input.len());
    assert_eq!(output[0].class_id, 7);
    assert_eq!(output[1].class_id, 1);
    assert_eq!(output[2].class_id, 7);
  }

  #[test]
  fn truncates_box_coordinates() {
    // 坐标截断而不是四舍五入
    let output = normalize(&[raw([10.9, 20.2, 110.7, 220.499], 0.87, 2)]);
    assert_eq!(output[0].bbox, [10, 20, 110, 220]);
  }

  #[test]
  fn rounds_score_to_one_decimal() {
    // 0.87 四舍五入到 0.9，确认是舍入而不是截断
    let output = normalize(&[raw([0.0, 0.0, 1.0, 1.0], 0.87, 0)]);
    assert_eq!(output[0].score, 0.9);

    let output = normalize(&[raw([0.0, 0.0, 1.0, 1.0], 0.34, 0)]);
    assert_eq!(output[0].score, 0.3);
  }

  #[test]
  fn score_is_multiple_of_a_tenth() {
    for score in [0.0f32, 0.07, 0.13, 0.5, 0.8431, 0.96, 1.0] {
      let output = normalize(&[raw([0.0, 0.0, 1.0, 1.0], score, 0)]);
      let scaled = output[0].score * 10.0;
      assert!(
        (scaled - scaled.round()).abs() < 1e-5,
        "score {} 不是 0.1 的整数倍",
        output[0].score
      );
      assert!((0.0..=1.0).contains(&output[0].score));
    }
  }

  #[test]
  fn empty_input_yields_empty_output() {
    assert!(normalize(&[]).is_empty());
  }

  #[test]
  fn wire_field_names() {
    let detection = Detection {
      bbox: [10, 20, 110, 220],
      score: 0.9,
      class_id: 2,
    };
    let json = serde_json::to_value(&detection).unwrap();
    assert_eq!(json["box"], serde_json::json!([10, 20, 110, 220]));
    assert_eq!(json["class"], 2);
    assert!((json["score"].as_f64().unwrap() - 0.9).abs() < 1e-6);
  }
}
