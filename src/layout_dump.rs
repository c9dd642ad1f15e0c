use crate::layout::{BoxLayout, LabelPlacement};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub width: u32,
    pub height: u32,
    pub boxes: Vec<BoxDump>,
}

#[derive(Debug, Serialize)]
pub struct BoxDump {
    pub index: usize,
    pub name: String,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub labels: Vec<LabelPlacement>,
}

impl LayoutDump {
    pub fn from_layouts(layouts: &[BoxLayout], width: u32, height: u32) -> Self {
        let boxes = layouts
            .iter()
            .enumerate()
            .map(|(index, layout)| BoxDump {
                index,
                name: layout.bbox.name.clone(),
                x1: layout.bbox.x1,
                y1: layout.bbox.y1,
                x2: layout.bbox.x2,
                y2: layout.bbox.y2,
                labels: layout.placements.clone(),
            })
            .collect();
        Self {
            width,
            height,
            boxes,
        }
    }
}

pub fn write_layout_dump(path: &Path, dump: &LayoutDump) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, dump)?;
    Ok(())
}
