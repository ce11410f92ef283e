//! COCO class names for the pretrained YOLO checkpoints this tool targets.

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

/// Human-readable name for a class id, with a generic fallback for models
/// trained on other label sets.
pub fn class_name(class_id: i64) -> &'static str {
    usize::try_from(class_id)
        .ok()
        .and_then(|id| COCO_CLASSES.get(id))
        .copied()
        .unwrap_or("object")
}

#[cfg(test)]
mod tests {
    use super::class_name;

    #[test]
    fn known_ids_map_to_coco_names() {
        assert_eq!(class_name(0), "person");
        assert_eq!(class_name(2), "car");
        assert_eq!(class_name(79), "toothbrush");
    }

    #[test]
    fn unknown_ids_fall_back_to_a_generic_name() {
        assert_eq!(class_name(80), "object");
        assert_eq!(class_name(-1), "object");
    }
}
