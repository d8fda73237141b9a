use image::{DynamicImage, GenericImageView};
use img_normalize::config::{ConversionOptions, ResizeBound};
use img_normalize::constants::SOURCE_EXTENSIONS;
use img_normalize::filter::{is_eligible, output_path_for, ConversionJob};
use img_normalize::transform::resize_image;
use proptest::prelude::*;
use std::path::Path;

fn mixed_case(ext: &str, mask: u8) -> String {
    ext.chars()
        .enumerate()
        .map(|(i, c)| if mask & (1 << (i % 8)) != 0 { c.to_ascii_uppercase() } else { c })
        .collect()
}

proptest! {
    #[test]
    fn output_is_never_eligible(
        stem in "[a-zA-Z0-9_-]{1,16}",
        ext in prop::sample::select(SOURCE_EXTENSIONS),
        mask in any::<u8>()
    ) {
        let filename = format!("{}.{}", stem, mixed_case(ext, mask));
        let input = Path::new(&filename);

        prop_assert!(is_eligible(input));
        let output = output_path_for(input);
        prop_assert!(!is_eligible(&output));
        prop_assert_eq!(output.extension().unwrap(), "webp");
        prop_assert_eq!(output.file_stem().unwrap().to_string_lossy(), stem);
    }

    #[test]
    fn output_path_is_deterministic(
        dir in "[a-z]{1,8}(/[a-z]{1,8}){0,3}",
        stem in "[a-zA-Z0-9_.-]{1,16}",
        ext in prop::sample::select(SOURCE_EXTENSIONS)
    ) {
        let filename = format!("/{}/{}.{}", dir, stem, ext);
        let input = Path::new(&filename);
        let options = ConversionOptions::new(ResizeBound::MaxWidth(1920), None).unwrap();

        let first = ConversionJob::for_path(input, &options);
        let second = ConversionJob::for_path(input, &options);
        prop_assert_eq!(&first, &second);
        if let Some(job) = first {
            prop_assert_eq!(job.output.parent(), input.parent());
        }
    }

    #[test]
    fn quality_in_range_is_accepted(quality in 0u8..=255u8) {
        let result = ConversionOptions::new(ResizeBound::Unbounded, Some(quality));
        if quality == 0 || quality > 100 {
            prop_assert!(result.is_err());
        } else {
            prop_assert_eq!(result.unwrap().quality, quality);
        }
    }

    #[test]
    fn target_dimensions_shrink_only(
        width in 1u32..=20000u32,
        height in 1u32..=20000u32,
        max in 1u32..=8000u32
    ) {
        let (w, h) = ResizeBound::MaxWidth(max).target_dimensions(width, height);
        if width <= max {
            prop_assert_eq!((w, h), (width, height));
        } else {
            prop_assert_eq!(w, max);
            let proportional = height as f64 * max as f64 / width as f64;
            prop_assert!((h as f64 - proportional).abs() <= 1.0 || h == 1);
            prop_assert!(h <= height);
        }
    }

    #[test]
    fn resize_bound_round_trips_through_display(max in 1u32..=100_000u32) {
        let bound = ResizeBound::MaxWidth(max);
        prop_assert_eq!(bound.to_string().parse::<ResizeBound>().unwrap(), bound);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn resize_image_shrink_only(
        width in 1u32..=200u32,
        height in 1u32..=200u32,
        max in 1u32..=200u32
    ) {
        let img = DynamicImage::new_rgb8(width, height);
        let (new_w, new_h) = resize_image(img, ResizeBound::MaxWidth(max)).dimensions();

        prop_assert_eq!(new_w, width.min(max));
        if width <= max {
            prop_assert_eq!(new_h, height);
        } else {
            let proportional = height as f64 * max as f64 / width as f64;
            prop_assert!((new_h as f64 - proportional).abs() <= 1.0);
        }
    }
}
