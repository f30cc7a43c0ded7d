//! End-to-end tests for layout flattening, alignment and mapping builds.

use fieldmask::align::{AlignerConfig, TextPositionAligner};
use fieldmask::config::Config;
use fieldmask::layout::{LayoutDocument, LayoutFlattener};
use fieldmask::{Bbox, BboxMapping, Granularity, MappingPipeline};
use tempfile::TempDir;

mod common;
use common::*;

fn invoice() -> LayoutDocument {
    serde_json::from_value(invoice_layout()).expect("fixture layout parses")
}

mod flattening {
    use super::*;

    #[test]
    fn test_invoice_runs_in_reading_order() {
        let runs = LayoutFlattener::default().flatten(&invoice());
        let texts: Vec<&str> = runs.iter().map(|r| r.text.as_str()).collect();

        assert_eq!(runs.len(), 15);
        assert_eq!(texts[0], "增值税电子普通发票");
        assert_eq!(&texts[5..11], ["项目", "数量", "金额", "服务费", "1", "100.00"]);
        assert_eq!(texts[11], "销售方 北京数据有限公司");
        assert_eq!(texts[14], "第1页");
    }

    #[test]
    fn test_table_cells_land_inside_table() {
        let runs = LayoutFlattener::default().flatten(&invoice());
        let service_fee = runs.iter().find(|r| r.text == "服务费").unwrap();

        assert!(service_fee.is_table);
        assert_bbox_eq(service_fee.bbox, [50.0, 200.0, 150.0, 230.0]);
    }

    #[test]
    fn test_discarded_blocks_can_be_skipped() {
        let runs = LayoutFlattener::default()
            .with_discarded(false)
            .flatten(&invoice());
        assert_eq!(runs.len(), 14);
        assert!(runs.iter().all(|r| r.text != "第1页"));
    }

    fn sideways(rotated: Option<bool>) -> LayoutDocument {
        serde_json::from_value(sideways_table_layout(rotated)).expect("fixture layout parses")
    }

    fn unit_price_bbox(config: &Config, doc: &LayoutDocument) -> Bbox {
        let runs = LayoutFlattener::from_config(config).flatten(doc);
        runs.iter().find(|r| r.text == "单价").unwrap().bbox
    }

    #[test]
    fn test_rotation_vote_follows_table_config() {
        // one tall box out of three clears the default 0.3 vote
        let rotated = unit_price_bbox(&Config::default(), &sideways(None));
        assert_bbox_eq(rotated, [160.0, 300.0 + 280.0 / 3.0, 220.0, 300.0 + 290.0 / 3.0]);

        let strict = Config::from_toml_str("[table]\nrotation_vote_threshold = 0.5\n").unwrap();
        let upright = unit_price_bbox(&strict, &sideways(None));
        assert_bbox_eq(upright, [120.0, 310.0, 140.0, 320.0]);
    }

    #[test]
    fn test_cell_flag_overrides_rotation_vote() {
        let upright = unit_price_bbox(&Config::default(), &sideways(Some(false)));
        assert_bbox_eq(upright, [120.0, 310.0, 140.0, 320.0]);
    }
}

mod alignment {
    use super::*;

    #[test]
    fn test_invoice_alignment_summary() {
        let runs = LayoutFlattener::default().flatten(&invoice());
        let alignment = TextPositionAligner::default().align(&runs, INVOICE_MARKDOWN);
        let summary = &alignment.summary;

        assert_eq!(summary.total, 15);
        assert_eq!(summary.resolved, 14);
        assert_eq!(summary.unresolved, 1);
        assert_eq!(summary.retried, 0);
        assert_eq!(summary.by_strategy.get("html_table"), Some(&1));
        assert_eq!(summary.by_strategy.get("markdown_stripped"), Some(&1));
        assert_eq!(summary.by_strategy.get("direct"), Some(&12));
    }

    #[test]
    fn test_document_indices_point_at_run_text() {
        let runs = LayoutFlattener::default().flatten(&invoice());
        let alignment = TextPositionAligner::default().align(&runs, INVOICE_MARKDOWN);

        let index_of = |text: &str| {
            alignment
                .runs
                .iter()
                .find(|r| r.run.text == text)
                .and_then(|r| r.document_index)
        };

        assert_eq!(index_of("购买方"), Some(char_offset(INVOICE_MARKDOWN, "购买方")));
        assert_eq!(index_of("服务费"), Some(char_offset(INVOICE_MARKDOWN, "服务费")));
        // anchored at the start of the HTML fragment
        assert_eq!(
            index_of("销售方 北京数据有限公司"),
            Some(char_offset(INVOICE_MARKDOWN, "<table>"))
        );
        assert_eq!(index_of("注：本发票仅供测试"), Some(char_offset(INVOICE_MARKDOWN, "注：")));
        assert_eq!(index_of("第1页"), None);
    }

    #[test]
    fn test_table_cell_value_is_not_taken_from_earlier_text() {
        let runs = LayoutFlattener::default().flatten(&invoice());
        let alignment = TextPositionAligner::default().align(&runs, INVOICE_MARKDOWN);

        let one = alignment.runs.iter().find(|r| r.run.text == "1").unwrap();
        let row = char_offset(INVOICE_MARKDOWN, "| 服务费 | 1 |");
        assert_eq!(one.document_index, Some(row + "| 服务费 | ".chars().count()));
    }

    #[test]
    fn test_whitespace_and_punctuation_drift() {
        let runs = vec![
            run_at("合计金额", [0.0, 0.0, 80.0, 20.0]),
            run_at("日期2024/01/05", [0.0, 30.0, 120.0, 50.0]),
        ];
        let document = "合 计 金 额\n日期: 2024-01-05\n";
        let alignment = TextPositionAligner::default().align(&runs, document);

        assert_eq!(alignment.runs[0].strategy, Some("whitespace_collapsed"));
        assert_eq!(alignment.runs[0].document_index, Some(0));
        assert_eq!(alignment.runs[1].strategy, Some("alphanumeric"));
        assert_eq!(alignment.runs[1].document_index, Some(char_offset(document, "日期")));
    }

    #[test]
    fn test_prefix_fallback_is_opt_in() {
        let runs = vec![run_at("统一社会信用代码X9", [0.0, 0.0, 100.0, 20.0])];
        let document = "统一社会信用代码：91440300\n";

        let default = TextPositionAligner::default().align(&runs, document);
        assert_eq!(default.summary.unresolved, 1);

        let with_prefix = TextPositionAligner::new(AlignerConfig {
            prefix_fallback_min_chars: Some(5),
            ..AlignerConfig::default()
        })
        .align(&runs, document);
        assert_eq!(with_prefix.runs[0].strategy, Some("prefix"));
        assert_eq!(with_prefix.runs[0].document_index, Some(0));
    }

    fn run_at(text: &str, bbox: [f64; 4]) -> fieldmask::TextRun {
        fieldmask::TextRun {
            text: text.to_string(),
            bbox: fieldmask::Bbox::new(bbox[0], bbox[1], bbox[2], bbox[3]),
            page_index: 0,
            is_table: false,
        }
    }
}

mod mapping_build {
    use super::*;

    #[test]
    fn test_char_mapping_for_invoice() {
        let build = MappingPipeline::default().build(&invoice(), INVOICE_MARKDOWN);
        let mapping = &build.mapping;

        let total_chars: usize = LayoutFlattener::default()
            .flatten(&invoice())
            .iter()
            .map(|r| r.text.chars().count())
            .sum();
        assert_eq!(mapping.len(), total_chars);

        let shen = mapping.get("深").unwrap();
        assert_eq!(
            shen.document_index,
            Some(char_offset(INVOICE_MARKDOWN, "深圳") as i64)
        );
        // characters keep the vertical extent of their run
        assert_eq!((shen.bbox.y0, shen.bbox.y1), (130.0, 150.0));

        // the footer never aligned
        assert_eq!(mapping.get("第").unwrap().document_index, Some(-1));
    }

    #[test]
    fn test_repeated_characters_get_suffixes() {
        let build = MappingPipeline::default().build(&invoice(), INVOICE_MARKDOWN);
        assert!(build.mapping.contains_key("发"));
        assert!(build.mapping.contains_key("发_1"));
        assert_eq!(build.mapping.base_text("发_1"), "发");
    }

    #[test]
    fn test_run_mapping_keys_are_run_texts() {
        let build = MappingPipeline::default()
            .with_granularity(Granularity::Run)
            .build(&invoice(), INVOICE_MARKDOWN);

        assert_eq!(build.mapping.len(), 15);
        let entry = build.mapping.get("名称：深圳云创科技有限公司").unwrap();
        assert_bbox_eq(entry.bbox, [120.0, 130.0, 400.0, 150.0]);
        assert_eq!(entry.document_index, None);
    }

    #[test]
    fn test_build_from_files_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let (layout, markdown) = write_invoice_inputs(temp_dir.path()).unwrap();

        let build = MappingPipeline::default()
            .build_from_files(&layout, &markdown)
            .unwrap();
        let path = temp_dir.path().join("mapping.json");
        build.mapping.save(&path).unwrap();

        let reloaded = BboxMapping::load(&path).unwrap();
        assert_eq!(reloaded, build.mapping);
        let keys: Vec<&str> = reloaded.iter().take(3).map(|(k, _)| k).collect();
        assert_eq!(keys, ["增", "值", "税"]);
    }

    #[test]
    fn test_config_switches_reach_the_pipeline() {
        let config = Config::from_toml_str(
            r#"
            [layout]
            include_discarded = false
            "#,
        )
        .unwrap();
        let build = MappingPipeline::new(&config)
            .with_granularity(Granularity::Run)
            .build(&invoice(), INVOICE_MARKDOWN);

        assert_eq!(build.summary.total, 14);
        assert_eq!(build.summary.unresolved, 0);
    }
}
