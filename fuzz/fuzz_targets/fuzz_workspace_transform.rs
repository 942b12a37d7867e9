#![no_main]
use haptics_core::Transform;
use haptics_traits::{Vector3, WorkspaceBox};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: ([f64; 6], [f64; 6], bool, [f64; 3])| {
    let (device, app, preserve, point) = input;
    let device = WorkspaceBox::from_extents(device);
    let app = WorkspaceBox::from_extents(app);
    let Ok(t) = Transform::compute(&device, &app, preserve) else {
        return;
    };
    let p = t.apply(Vector3::from(point));
    if let Some(inv) = t.inverse() {
        let _ = inv.apply(p);
    }
});
