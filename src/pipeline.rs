//! Layout + document text -> bbox mapping.

use std::path::Path;

use tracing::info;

use crate::align::{AlignmentSummary, TextPositionAligner};
use crate::config::Config;
use crate::error::{MaskError, MaskResult};
use crate::layout::{LayoutDocument, LayoutFlattener};
use crate::mapping::BboxMapping;

/// What a mapping key stands for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Granularity {
    /// One entry per character, with document positions.
    #[default]
    Char,
    /// One entry per text run.
    Run,
}

/// A built mapping and how well its runs aligned.
#[derive(Debug, Clone)]
pub struct MappingBuild {
    pub mapping: BboxMapping,
    pub summary: AlignmentSummary,
}

pub struct MappingPipeline {
    flattener: LayoutFlattener,
    aligner: TextPositionAligner,
    granularity: Granularity,
}

impl Default for MappingPipeline {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl MappingPipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            flattener: LayoutFlattener::from_config(config),
            aligner: TextPositionAligner::new(config.aligner.clone()),
            granularity: Granularity::default(),
        }
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_aligner(mut self, aligner: TextPositionAligner) -> Self {
        self.aligner = aligner;
        self
    }

    pub fn build(&self, layout: &LayoutDocument, document: &str) -> MappingBuild {
        let runs = self.flattener.flatten(layout);
        let alignment = self.aligner.align(&runs, document);

        let mapping = match self.granularity {
            Granularity::Char => {
                BboxMapping::from_char_entries(&alignment.char_entries(self.aligner.expander()))
            }
            Granularity::Run => BboxMapping::from_runs(&alignment.runs),
        };

        info!(
            runs = runs.len(),
            entries = mapping.len(),
            granularity = ?self.granularity,
            "mapping built"
        );

        MappingBuild {
            mapping,
            summary: alignment.summary,
        }
    }

    /// Reads the layout JSON and the rendered markdown, then builds.
    pub fn build_from_files(&self, layout_path: &Path, document_path: &Path) -> MaskResult<MappingBuild> {
        let layout = LayoutDocument::from_file(layout_path)?;
        let document =
            std::fs::read_to_string(document_path).map_err(|e| MaskError::io(document_path, e))?;
        Ok(self.build(&layout, &document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: &str = r#"{
        "pdf_info": [{
            "page_idx": 0,
            "preproc_blocks": [{
                "type": "text",
                "bbox": [0, 0, 200, 20],
                "lines": [{"spans": [
                    {"type": "text", "content": "姓名：", "bbox": [0, 0, 30, 20]},
                    {"type": "text", "content": "张三", "bbox": [30, 0, 50, 20]}
                ]}]
            }]
        }]
    }"#;

    #[test]
    fn test_char_mapping() {
        let layout = LayoutDocument::from_json_str(LAYOUT).unwrap();
        let build = MappingPipeline::default().build(&layout, "姓名：张三\n");

        assert_eq!(build.mapping.len(), 5);
        assert_eq!(build.summary.resolved, 2);
        let zhang = build.mapping.get("张").unwrap();
        assert_eq!(zhang.document_index, Some(3));
        assert_eq!(zhang.bbox.to_array(), [30.0, 0.0, 45.0, 20.0]);
    }

    #[test]
    fn test_run_mapping() {
        let layout = LayoutDocument::from_json_str(LAYOUT).unwrap();
        let build = MappingPipeline::default()
            .with_granularity(Granularity::Run)
            .build(&layout, "姓名：张三\n");

        let keys: Vec<_> = build.mapping.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["姓名：", "张三"]);
        assert_eq!(build.mapping.get("张三").unwrap().document_index, None);
    }
}
