//! The `<clock>` section: offset and guest timer configuration.
//!
//! Timer settings are OS-sensitive; some guest kernels panic when HPET is
//! present, so the helper makes every timer explicit.

use crate::binding::{AttrListMarshal, Binding};
use crate::entity::{Entity, Model, Slot};
use crate::error::Result;
use crate::value::AttrValue;

static TIMERS: AttrListMarshal = AttrListMarshal { tag: "timer" };

pub static MODEL: Model = Model {
    name: "ClockXml",
    tag: "clock",
    slots: &[
        Slot {
            name: "offset",
            binding: Binding::Attribute { path: ".", attr: "offset", default: Some("utc") },
        },
        Slot {
            name: "timers",
            binding: Binding::List { path: ".", marshal: &TIMERS, polymorphic: false },
        },
    ],
    uncomparable: &[],
};

/// UTC clock with explicit RTC/PIT tick policies and HPET presence.
pub fn utc(rtc_policy: &str, pit_policy: &str, hpet_present: bool) -> Result<Entity> {
    let mut clock = MODEL.new_entity();
    clock.set("offset", "utc")?;
    clock.set(
        "timers",
        vec![
            AttrValue::map([("name", "rtc"), ("tickpolicy", rtc_policy)]),
            AttrValue::map([("name", "pit"), ("tickpolicy", pit_policy)]),
            AttrValue::map([
                ("name", "hpet"),
                ("present", if hpet_present { "yes" } else { "no" }),
            ]),
        ],
    )?;
    Ok(clock)
}
