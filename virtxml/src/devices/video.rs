//! Video adapter elements (`<video>`).

use crate::binding::Binding;
use crate::entity::{Entity, Model, Slot};
use crate::error::Result;
use crate::value::AttrValue;

pub static MODEL: Model = Model {
    name: "VideoXml",
    tag: "video",
    slots: &[Slot {
        name: "model",
        binding: Binding::Map { path: "model" },
    }],
    uncomparable: &[],
};

/// A primary display adapter. VGA gives maximum installer compatibility,
/// virtio the best performance once drivers are present.
pub fn primary(model_type: &str, vram_kb: u32, heads: u32) -> Result<Entity> {
    let mut video = MODEL.new_entity();
    video.set(
        "model",
        AttrValue::map([
            ("type", model_type.to_string()),
            ("vram", vram_kb.to_string()),
            ("heads", heads.to_string()),
            ("primary", "yes".to_string()),
        ]),
    )?;
    Ok(video)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_video() {
        let video = primary("vga", 16384, 1).unwrap();
        let xml = video.to_xml();
        assert!(xml.contains("type=\"vga\""));
        assert!(xml.contains("vram=\"16384\""));
        assert!(xml.contains("primary=\"yes\""));
    }
}
