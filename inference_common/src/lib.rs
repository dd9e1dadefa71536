pub mod annotate;
pub mod bbox;
pub mod coco_classes;
pub mod counting;
pub mod detection;
pub mod frame_meta;
pub mod sampler;
pub mod video_meta;
