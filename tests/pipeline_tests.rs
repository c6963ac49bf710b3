//! Finalization Pipeline Tests
//!
//! Tests for:
//! - GPU silence outside `update`: initialize never touches the device
//! - FIFO finalize ordering within one pass
//! - Deduplicated uploads under concurrent requests
//! - Default-object binding for missing texture sources
//! - Release of GPU objects after the last handle drops
//! - Shader link failure degrading to a ready, unlinked program

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use candela::assets::{Asset, AssetServer, AssetServerSettings, Handle};
use candela::gpu::{GpuOp, HeadlessDevice};
use candela::resources::{Model, Shader, Texture, TextureParams};

fn server_at(root: &Path, workers: usize) -> AssetServer {
    let _ = env_logger::builder().is_test(true).try_init();
    AssetServer::new(AssetServerSettings {
        root: root.to_path_buf(),
        worker_threads: workers,
    })
}

fn write_png(root: &Path, name: &str, edge: u32, color: [u8; 4]) {
    let dir = root.join("Textures");
    fs::create_dir_all(&dir).unwrap();
    let img = image::RgbaImage::from_pixel(edge, edge, image::Rgba(color));
    img.save(dir.join(format!("{name}.png"))).unwrap();
}

fn write_obj(root: &Path, name: &str, text: &str) {
    let dir = root.join("Models");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{name}.obj")), text).unwrap();
}

fn write_shader(root: &Path, name: &str) {
    let dir = root.join("Shaders");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{name}.vsh")), "void main() {}\n").unwrap();
    fs::write(dir.join(format!("{name}.fsh")), "void main() {}\n").unwrap();
}

fn pump_until_ready<A: Asset>(server: &AssetServer, device: &HeadlessDevice, handle: &Handle<A>) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !handle.ready() {
        assert!(Instant::now() < deadline, "asset never became ready");
        server.update(device);
        thread::sleep(Duration::from_millis(2));
    }
}

const TRIANGLE_OBJ: &str = "\
v 0 0 0
v 1 0 0
v 1 1 0
vt 0 0
vt 1 0
vt 1 1
f 1/1 2/2 3/3
";

// ============================================================================
// Device Silence Outside update()
// ============================================================================

#[test]
fn uploads_happen_only_inside_update() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "brick", 4, [200, 180, 160, 255]);
    let server = server_at(dir.path(), 1);
    let device = HeadlessDevice::new();

    let handle = server.load::<Texture>("brick", TextureParams::default(), false);
    // The decode ran inline; no device call may have happened yet.
    assert!(device.ops().is_empty());
    assert!(!handle.ready());

    server.update(&device);
    assert!(handle.ready());

    let ops = device.ops();
    assert!(matches!(ops[0], GpuOp::CreateTexture {
        width: 4,
        height: 4,
        mip_levels: 3,
        ..
    }));
    assert!(matches!(ops[1], GpuOp::UploadTexture { bytes: 64, .. }));
    assert!(matches!(ops[2], GpuOp::GenerateMipmaps(_)));
    assert!(handle.gpu_id().is_some());
}

// ============================================================================
// FIFO Ordering
// ============================================================================

#[test]
fn one_pass_finalizes_in_submission_order() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "first", 4, [1, 1, 1, 255]);
    write_png(dir.path(), "second", 8, [2, 2, 2, 255]);
    let server = server_at(dir.path(), 1);
    let device = HeadlessDevice::new();

    let first = server.load::<Texture>("first", TextureParams::default(), false);
    let second = server.load::<Texture>("second", TextureParams::default(), false);
    server.update(&device);
    assert!(first.ready() && second.ready());

    let ops = device.ops();
    let pos_of = |edge: u32| {
        ops.iter()
            .position(|op| matches!(op, GpuOp::CreateTexture { width, .. } if *width == edge))
            .unwrap()
    };
    assert!(pos_of(4) < pos_of(8));
}

// ============================================================================
// Deduplicated Uploads
// ============================================================================

#[test]
fn concurrent_texture_requests_upload_once() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "shared", 8, [9, 9, 9, 255]);
    let server = Arc::new(server_at(dir.path(), 4));
    let device = HeadlessDevice::new();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let server = Arc::clone(&server);
            thread::spawn(move || server.load::<Texture>("shared", TextureParams::default(), true))
        })
        .map(|t| t.join().unwrap())
        .collect();
    for handle in &handles {
        pump_until_ready(&server, &device, handle);
    }

    let creates = device.count(|op| matches!(op, GpuOp::CreateTexture { .. }));
    let uploads = device.count(|op| matches!(op, GpuOp::UploadTexture { .. }));
    assert_eq!(creates, 1);
    assert_eq!(uploads, 1);
}

#[test]
fn concurrent_model_requests_upload_one_vertex_buffer() {
    let dir = tempfile::tempdir().unwrap();
    write_obj(dir.path(), "tri", TRIANGLE_OBJ);
    let server = Arc::new(server_at(dir.path(), 4));
    let device = HeadlessDevice::new();

    // One threaded and one synchronous request race for the same record.
    let handles: Vec<_> = (0..2)
        .map(|i| {
            let server = Arc::clone(&server);
            thread::spawn(move || server.load::<Model>("tri", (), i == 0))
        })
        .map(|t| t.join().unwrap())
        .collect();
    assert!(handles[0].ptr_eq(&handles[1]));
    for handle in &handles {
        pump_until_ready(&server, &device, handle);
    }
    assert_eq!(
        device.count(|op| matches!(op, GpuOp::CreateBuffer { .. })),
        1
    );

    // The model also queued its material; that converges to one array texture.
    let material = handles[0].read().material().unwrap().clone();
    pump_until_ready(&server, &device, &material);
    assert_eq!(
        device.count(|op| matches!(op, GpuOp::CreateTexture { layers: 3, .. })),
        1
    );
}

// ============================================================================
// Missing Sources Bind the Default Object
// ============================================================================

#[test]
fn missing_textures_bind_the_default_gpu_object() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_at(dir.path(), 1);
    let device = HeadlessDevice::new();

    let ghost = server.load::<Texture>("ghost", TextureParams::default(), false);
    assert_eq!(ghost.name(), "");
    server.update(&device);
    assert!(ghost.ready());

    // The default image is a single white pixel, so no mip pass runs.
    let ops = device.ops();
    assert!(matches!(ops[0], GpuOp::CreateTexture {
        width: 1,
        height: 1,
        mip_levels: 1,
        ..
    }));

    let created = ghost.gpu_id().unwrap();
    ghost.bind(&device, 2);
    assert!(device.ops().contains(&GpuOp::BindTexture {
        unit: 2,
        id: created
    }));
}

// ============================================================================
// Release on Drop
// ============================================================================

#[test]
fn gpu_objects_are_deleted_after_the_last_handle_drops() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "brick", 4, [5, 5, 5, 255]);
    let server = server_at(dir.path(), 1);
    let device = HeadlessDevice::new();

    let handle = server.load::<Texture>("brick", TextureParams::default(), false);
    server.update(&device);
    let id = handle.gpu_id().unwrap();
    assert_eq!(device.count(|op| matches!(op, GpuOp::DeleteTexture(_))), 0);

    drop(handle);
    server.update(&device);
    assert!(device.ops().contains(&GpuOp::DeleteTexture(id)));
    assert_eq!(server.resident_count(), 0);
}

// ============================================================================
// Link Failure Degrade
// ============================================================================

#[test]
fn link_failures_still_converge_to_a_bindable_ready_record() {
    let dir = tempfile::tempdir().unwrap();
    write_shader(dir.path(), "basic");
    let server = server_at(dir.path(), 1);
    let device = HeadlessDevice::new();

    let handle = server.load::<Shader>("basic", (), false);
    device.fail_next_link();
    server.update(&device);

    assert!(handle.ready());
    assert!(!handle.link_ok());
    assert!(handle.gpu_id().is_some());
    // The program object is kept alive for as long as the handle lives.
    assert_eq!(device.count(|op| matches!(op, GpuOp::DeleteProgram(_))), 0);

    drop(handle);
    server.update(&device);
    assert_eq!(device.count(|op| matches!(op, GpuOp::DeleteProgram(_))), 1);
}
