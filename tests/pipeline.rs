use approx::assert_abs_diff_eq;
use ndarray::Array3;

use volprep::core::processing::crop::crop_window;
use volprep::{CropDecision, Error, Pipeline, PipelineParams, TrespassPolicy, Volume};

/// Cubic mask of side `n` with a labelled block at `[lo, hi)` on every axis.
fn mask(n: usize, lo: usize, hi: usize) -> Volume {
    let data = Array3::from_shape_fn((n, n, n), |(x, y, z)| {
        let inside = [x, y, z].iter().all(|&i| (lo..hi).contains(&i));
        if inside { 1.0 } else { 0.0 }
    });
    Volume::label(data, [1.0; 3]).unwrap()
}

/// Image whose intensity encodes the x and y index of each voxel.
fn coded_image(n: usize) -> Volume {
    let data = Array3::from_shape_fn((n, n, n), |(x, y, _)| (x + 100 * y) as f32);
    Volume::image(data, [1.0; 3]).unwrap()
}

fn dataset() -> (Vec<Volume>, Vec<Volume>) {
    let masks = vec![mask(50, 10, 20), mask(60, 45, 55), mask(40, 5, 35)];
    let images = vec![coded_image(50), coded_image(60), coded_image(40)];
    (masks, images)
}

fn params(shape: [usize; 3]) -> PipelineParams {
    PipelineParams {
        target_spacing: [1.0; 3],
        target_shape: shape,
        ..Default::default()
    }
}

#[test]
fn masks_crop_to_smallest_extent_with_one_plan_entry_each() {
    let (masks, _) = dataset();
    let pipeline = Pipeline::with_native(PipelineParams {
        masks_only: true,
        ..params([40, 40, 40])
    })
    .unwrap();

    let out = pipeline.run(masks, None).unwrap();
    assert!(out.images.is_none());
    assert_eq!(out.plan.target, [40, 40, 40]);
    assert_eq!(out.plan.len(), 3);
    assert!(out.masks.iter().all(|m| m.shape() == [40, 40, 40]));
    assert_eq!(out.plan.trespass_count(), 0);

    // foreground near the start of the first mask, near the end of the second
    assert_eq!(out.plan.entries[0].decisions.unwrap(), [CropDecision::ProtectStart; 3]);
    assert_eq!(out.plan.entries[1].decisions.unwrap(), [CropDecision::ProtectEnd; 3]);

    // every labelled voxel survived the crop
    let kept: Vec<f32> = out.masks.iter().map(|m| m.data().sum()).collect();
    assert_eq!(kept, [1000.0, 1000.0, 27000.0]);
}

#[test]
fn images_replay_the_mask_crop() {
    let (masks, images) = dataset();
    let pipeline = Pipeline::with_native(params([40, 40, 40])).unwrap();
    let out = pipeline.run(masks, Some(images)).unwrap();

    let images = out.images.expect("image pass output");
    assert_eq!(images.len(), 3);
    for (i, (image, mask)) in images.iter().zip(&out.masks).enumerate() {
        assert_eq!(image.shape(), mask.shape());

        let entry = &out.plan.entries[i];
        let ratio = entry.ratio.get();
        let (x0, _) = crop_window(entry.extent[0], 40, ratio[0]);
        let (y0, _) = crop_window(entry.extent[1], 40, ratio[1]);
        assert_abs_diff_eq!(image.data()[[0, 0, 0]], (x0 + 100 * y0) as f32, epsilon = 0.05);
        assert_abs_diff_eq!(
            image.data()[[39, 39, 0]],
            (x0 + 39 + 100 * (y0 + 39)) as f32,
            epsilon = 0.05
        );
    }
}

#[test]
fn final_shapes_match_target_for_images_and_masks() {
    let (masks, images) = dataset();
    let pipeline = Pipeline::with_native(PipelineParams {
        target_spacing: [1.5, 1.0, 2.0],
        normalize: true,
        ..params([16, 24, 8])
    })
    .unwrap();
    let out = pipeline.run(masks, Some(images)).unwrap();
    let images = out.images.unwrap();
    for v in out.masks.iter().chain(&images) {
        assert_eq!(v.shape(), [16, 24, 8]);
        assert_eq!(v.origin(), [0.0; 3]);
    }
    assert!(images.iter().flat_map(|v| v.data().iter()).all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn worker_count_does_not_change_results() {
    let (masks, images) = dataset();
    let sequential = Pipeline::with_native(params([20, 20, 20]))
        .unwrap()
        .run(masks.clone(), Some(images.clone()))
        .unwrap();
    let parallel = Pipeline::with_native(PipelineParams {
        workers: Some(-1),
        ..params([20, 20, 20])
    })
    .unwrap()
    .run(masks, Some(images))
    .unwrap();

    assert_eq!(sequential.plan, parallel.plan);
    for (a, b) in sequential.masks.iter().zip(&parallel.masks) {
        assert_eq!(a.data(), b.data());
    }
    let (seq_images, par_images) = (sequential.images.unwrap(), parallel.images.unwrap());
    for (a, b) in seq_images.iter().zip(&par_images) {
        assert_eq!(a.data(), b.data());
    }
}

#[test]
fn image_pass_rejects_short_plans() {
    let (masks, images) = dataset();
    let pipeline = Pipeline::with_native(params([20, 20, 20])).unwrap();
    let mask_pass = pipeline.run_mask_pass(masks[..2].to_vec()).unwrap();
    let err = pipeline.run_image_pass(images, &mask_pass.plan).unwrap_err();
    assert!(matches!(
        err,
        Error::MissingCropRatios {
            expected: 3,
            found: 2
        }
    ));
}

#[test]
fn image_pass_rejects_images_of_another_extent() {
    let (masks, _) = dataset();
    let pipeline = Pipeline::with_native(params([20, 20, 20])).unwrap();
    let mask_pass = pipeline.run_mask_pass(masks).unwrap();
    let swapped = vec![coded_image(60), coded_image(50), coded_image(40)];
    assert!(matches!(
        pipeline.run_image_pass(swapped, &mask_pass.plan),
        Err(Error::DatasetMismatch(_))
    ));
}

#[test]
fn unequal_datasets_fail_before_processing() {
    let (masks, mut images) = dataset();
    images.pop();
    let pipeline = Pipeline::with_native(params([20, 20, 20])).unwrap();
    assert!(matches!(
        pipeline.run(masks, Some(images)),
        Err(Error::DatasetMismatch(_))
    ));
}

#[test]
fn abort_policy_stops_on_oversized_foreground() {
    // 40-voxel foreground in a 50-voxel mask cannot fit a 30-voxel common extent
    let masks = vec![mask(50, 5, 45), mask(30, 10, 20)];
    let pipeline = Pipeline::with_native(PipelineParams {
        masks_only: true,
        trespass: TrespassPolicy::Abort,
        ..params([10, 10, 10])
    })
    .unwrap();
    assert!(matches!(
        pipeline.run(masks.clone(), None),
        Err(Error::ForegroundTrespass { index: 0, .. })
    ));

    let warn = Pipeline::with_native(PipelineParams {
        masks_only: true,
        ..params([10, 10, 10])
    })
    .unwrap();
    let out = warn.run(masks, None).unwrap();
    assert_eq!(out.plan.trespass_count(), 1);
}
