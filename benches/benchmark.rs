use charuco_stereo_calibration::camera::{CameraIntrinsics, unproject_normalized};
use charuco_stereo_calibration::optimization::factors::StereoReprojectionFactor;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use glam::{Vec2, Vec3};
use nalgebra as na;
use tiny_solver::factors::Factor;

fn test_camera() -> CameraIntrinsics {
    CameraIntrinsics::new(910.0, 908.0, 640.0, 360.0, &[0.08, -0.15, 0.0005, -0.0003, 0.05])
}

fn bench_unproject(c: &mut Criterion) {
    let model = test_camera().model();
    let p2ds: Vec<_> = (0..100)
        .map(|i| na::Vector2::new(100.0 + i as f64 * 10.0, 50.0 + i as f64 * 6.0))
        .collect();

    c.bench_function("unproject_100", |b| {
        b.iter(|| {
            black_box(&p2ds)
                .iter()
                .map(|p| unproject_normalized(&model, p))
                .collect::<Vec<_>>()
        })
    });
}

fn bench_reprojection_residual(c: &mut Criterion) {
    let model = test_camera().model();
    let factor = StereoReprojectionFactor::new(
        &model,
        &Vec3::new(0.06, 0.09, 0.0),
        &Vec2::new(640.0, 360.0),
    );
    let relative = na::dvector![0.01, 0.08, -0.02, -0.1, 0.005, 0.01];
    let pose = na::dvector![0.2, -0.1, 0.05, -0.07, -0.1, 0.5];
    let all_params = vec![relative, pose];

    c.bench_function("stereo_reprojection_residual", |b| {
        b.iter(|| factor.residual_func(black_box(all_params.as_slice())))
    });
}

criterion_group!(benches, bench_unproject, bench_reprojection_residual);
criterion_main!(benches);
