//! End-to-end frames through the compositor with the CPU warp stage.

use std::sync::Arc;

use glam::Vec3;
use redshift_compositor::{
    CameraPose, ForegroundFrame, FramePhase, FrameTelemetry, HUD_LAYER, RelativisticCompositor,
    ShaderOutcome, SkipReason, hud_commands,
};
use redshift_config::{Config, StarfieldStrategy};
use redshift_relativity::{RelativisticTransform, TransformSettings, VelocityState, ViewMode};
use redshift_render::{CpuWarpStage, DisabledWarpStage, DrawCommand, EnvironmentMap, Raster};
use redshift_space::BackgroundLayer;

const W: u32 = 96;
const H: u32 = 64;

fn config(show_hud: bool) -> Config {
    let mut config = Config::default();
    config.window.width = W;
    config.window.height = H;
    config.debug.show_hud = show_hud;
    config
}

fn sky() -> BackgroundLayer {
    BackgroundLayer::new(
        StarfieldStrategy::Skybox,
        Arc::new(EnvironmentMap::uniform(8, [30, 40, 60, 255])),
        Vec::new(),
        TransformSettings::default(),
    )
}

fn cpu_compositor(show_hud: bool) -> RelativisticCompositor {
    RelativisticCompositor::new(&config(show_hud), Box::new(CpuWarpStage::new()), sky())
}

/// A planet with a ring, the way the scene rasterizer would hand it over.
fn planet_frame() -> ForegroundFrame {
    let mut image = Raster::new(W, H);
    image.draw_all(&[
        DrawCommand::Circle {
            center: (W as f32 * 0.6, H as f32 * 0.5),
            radius: 14.0,
            color: [180, 120, 80, 255],
            filled: true,
        },
        DrawCommand::Line {
            from: (W as f32 * 0.6 - 24.0, H as f32 * 0.5 + 4.0),
            to: (W as f32 * 0.6 + 24.0, H as f32 * 0.5 - 4.0),
            color: [220, 220, 200, 255],
        },
    ]);
    ForegroundFrame::new(image, CameraPose::default())
}

fn gradient() -> Raster {
    let mut raster = Raster::new(W, H);
    for y in 0..H {
        for x in 0..W {
            raster.set_pixel(x, y, [(x * 2) as u8, (y * 3) as u8, 128, 255]);
        }
    }
    raster
}

fn angle_between(a: Vec3, b: Vec3) -> f32 {
    a.dot(b).clamp(-1.0, 1.0).acos()
}

#[test]
fn docked_baseline_is_identity() {
    let mut compositor = cpu_compositor(false);
    compositor.set_view_angle(1.1);
    compositor.set_forward_velocity(0.0);
    assert_eq!(compositor.gamma(), 1.0);

    let source = gradient();
    let mut target = Raster::new(W, H);
    assert!(compositor.apply(&mut target, &source));
    assert_eq!(target, source);

    let report = compositor.render_frame(&FrameTelemetry::default(), Some(&planet_frame()));
    assert_eq!(
        report.outcome,
        ShaderOutcome::Skipped(SkipReason::BelowThreshold)
    );
    assert_eq!(compositor.output(), compositor.stack().pre_shader());
}

#[test]
fn cruise_at_half_c() {
    let mut compositor = cpu_compositor(false);
    compositor.set_forward_velocity(0.5);
    assert!((compositor.gamma() - 1.154_700_5).abs() < 1e-5);

    let (velocity, _) = VelocityState::from_speed(Vec3::NEG_Z, 0.5, 0.999);
    let transform = RelativisticTransform::new(&velocity, ViewMode::Raw, &TransformSettings::default());
    let b = velocity.boost_direction();

    let ahead = transform.apply(b);
    assert!((ahead.direction - b).length() < 1e-6);
    assert!(ahead.intensity > 1.0, "ahead intensity {}", ahead.intensity);

    let behind = transform.apply(-b);
    assert!((behind.direction + b).length() < 1e-6);
    assert!(behind.intensity < 1.0, "behind intensity {}", behind.intensity);

    let report = compositor.render_frame(&FrameTelemetry::default(), None);
    assert_eq!(report.outcome, ShaderOutcome::Applied { stage: "cpu" });
    assert!(report.phases.contains(&FramePhase::ApplyShader));

    // The sky straight ahead is brightened and shifted blue.
    let [r, _, b, _] = compositor.output().get_pixel(W / 2, H / 2).unwrap();
    assert!(b > 60, "blue channel {b} should exceed the unwarped 60");
    assert!(b > r);
}

#[test]
fn shader_unavailable_presents_unwarped() {
    let mut compositor =
        RelativisticCompositor::new(&config(false), Box::new(DisabledWarpStage), sky());
    assert!(!compositor.is_stage_available());
    compositor.set_forward_velocity(0.5);

    let source = gradient();
    let mut target = Raster::new(W, H);
    assert!(!compositor.apply(&mut target, &source));
    assert_eq!(target, source);

    for _ in 0..3 {
        let report = compositor.render_frame(&FrameTelemetry::default(), Some(&planet_frame()));
        assert_eq!(
            report.outcome,
            ShaderOutcome::Skipped(SkipReason::Unavailable)
        );
        assert_eq!(compositor.output(), compositor.stack().pre_shader());
    }
}

#[test]
fn compensated_mode_is_gentler() {
    let (velocity, _) = VelocityState::from_speed(Vec3::NEG_Z, 0.8, 0.999);
    let settings = TransformSettings::default();
    let raw = RelativisticTransform::new(&velocity, ViewMode::Raw, &settings);
    let nav = RelativisticTransform::new(&velocity, ViewMode::Compensated, &settings);

    let samples = [
        Vec3::X,
        Vec3::new(1.0, 0.0, -1.0).normalize(),
        Vec3::new(0.0, 1.0, 1.0).normalize(),
        Vec3::new(-0.3, 0.2, -1.0).normalize(),
    ];
    let spread = |t: &RelativisticTransform| -> f32 {
        samples.iter().map(|&n| angle_between(n, t.aberrate(n))).sum()
    };
    assert!(
        spread(&nav) < spread(&raw),
        "compensated spread {} should be below raw {}",
        spread(&nav),
        spread(&raw)
    );

    // Same comparison through whole frames.
    let mut compositor = cpu_compositor(false);
    compositor.set_forward_velocity(0.8);
    let raw_frame = compositor.render_frame(&FrameTelemetry::default(), Some(&planet_frame()));
    let raw_output = compositor.output().clone();
    let unwarped = compositor.stack().pre_shader().clone();

    compositor.set_mode(ViewMode::Compensated);
    assert_eq!(compositor.mode(), ViewMode::Raw);
    let nav_frame = compositor.render_frame(&FrameTelemetry::default(), Some(&planet_frame()));
    assert_eq!(raw_frame.mode, ViewMode::Raw);
    assert_eq!(nav_frame.mode, ViewMode::Compensated);
    assert!(nav_frame.effective_beta < raw_frame.effective_beta);

    let diff = |out: &Raster| -> u64 {
        out.as_bytes()
            .iter()
            .zip(unwarped.as_bytes())
            .map(|(a, b)| (*a as i64 - *b as i64).unsigned_abs())
            .sum()
    };
    assert!(diff(compositor.output()) < diff(&raw_output));
}

#[test]
fn hud_is_never_warped() {
    let telemetry = FrameTelemetry::default();
    let foreground = planet_frame();

    let mut bare = cpu_compositor(false);
    bare.set_forward_velocity(0.6);
    let bare_report = bare.render_frame(&telemetry, Some(&foreground));
    assert!(bare_report.outcome.warped());

    let mut with_hud = cpu_compositor(true);
    with_hud.set_forward_velocity(0.6);
    assert_eq!(with_hud.stack().is_warp_exempt(HUD_LAYER), Some(true));
    let report = with_hud.render_frame(&telemetry, Some(&foreground));
    assert!(report.outcome.warped());
    let readout = report.hud.expect("HUD enabled");

    // Draw the HUD alone and lay it over the warped frame that had no HUD.
    let mut hud_only = Raster::new(W, H);
    hud_only.draw_all(&hud_commands(&readout, W, H));
    let mut expected = bare.output().clone();
    expected.composite_over(&hud_only);

    assert_eq!(with_hud.output(), &expected);
    assert_ne!(with_hud.output(), bare.output(), "HUD should be visible");
}

#[test]
fn discrete_stars_skip_the_warp() {
    let star = redshift_relativity::StarSample {
        direction: Vec3::new(0.3, 0.0, -1.0).normalize(),
        brightness: 0.5,
        color: [1.0, 1.0, 1.0],
        angular_radius: 0.001,
    };
    let background = BackgroundLayer::new(
        StarfieldStrategy::DiscreteStars,
        Arc::new(EnvironmentMap::uniform(2, [0, 0, 0, 255])),
        vec![star],
        TransformSettings::default(),
    );
    let mut compositor =
        RelativisticCompositor::new(&config(false), Box::new(CpuWarpStage::new()), background);
    compositor.set_forward_velocity(0.5);
    let report = compositor.render_frame(&FrameTelemetry::default(), None);
    assert!(report.outcome.warped());

    // The star shows exactly where the analytic transform puts it.
    let (velocity, _) = VelocityState::from_speed(Vec3::NEG_Z, 0.5, 0.999);
    let seen = RelativisticTransform::new(&velocity, ViewMode::Raw, &TransformSettings::default())
        .transform_star(&star);
    let camera = redshift_render::ViewCamera::new(
        Vec3::NEG_Z,
        Vec3::Y,
        70f32.to_radians(),
        W,
        H,
    );
    let (x, y) = camera.project_to_pixel(seen.direction).unwrap();
    let pixel = compositor.output().get_pixel(x, y).unwrap();
    assert_eq!(pixel[3], 255);
    assert!(pixel[0] > 0);
}

#[test]
fn disabled_effect_leaves_discrete_stars_unshifted() {
    let star = redshift_relativity::StarSample {
        direction: Vec3::new(0.4, 0.0, -1.0).normalize(),
        brightness: 0.5,
        color: [1.0, 1.0, 1.0],
        angular_radius: 0.001,
    };
    let background = BackgroundLayer::new(
        StarfieldStrategy::DiscreteStars,
        Arc::new(EnvironmentMap::uniform(2, [0, 0, 0, 255])),
        vec![star],
        TransformSettings::default(),
    );
    let mut compositor =
        RelativisticCompositor::new(&config(false), Box::new(CpuWarpStage::new()), background);

    compositor.render_frame(&FrameTelemetry::default(), None);
    let at_rest = compositor.output().clone();

    compositor.set_forward_velocity(0.9);
    compositor.set_enabled(false);
    let report = compositor.render_frame(&FrameTelemetry::default(), None);
    assert_eq!(report.outcome, ShaderOutcome::Skipped(SkipReason::Disabled));
    assert_eq!(
        compositor.output(),
        &at_rest,
        "stars must not move, brighten or tint while the effect is off"
    );

    compositor.set_enabled(true);
    let report = compositor.render_frame(&FrameTelemetry::default(), None);
    assert!(report.outcome.warped());
    assert_ne!(compositor.output(), &at_rest);
}
