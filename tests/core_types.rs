use iconmatch::lowlevel::{resize_gray, TemplatePlan};
use iconmatch::{ColorImage, IconMatchError, IconSize, ImageView, OwnedImage};

#[test]
fn image_view_rejects_invalid_dimensions() {
    let data = [0u8; 4];

    let err = ImageView::from_slice(&data, 0, 1).err().unwrap();
    assert_eq!(
        err,
        IconMatchError::InvalidDimensions {
            width: 0,
            height: 1,
        }
    );

    let err = ImageView::from_slice(&data, 1, 0).err().unwrap();
    assert_eq!(
        err,
        IconMatchError::InvalidDimensions {
            width: 1,
            height: 0,
        }
    );
}

#[test]
fn image_view_rejects_mismatched_buffer() {
    let data = [0u8; 3];
    let err = ImageView::from_slice(&data, 2, 2).err().unwrap();
    assert_eq!(err, IconMatchError::BufferTooSmall { needed: 4, got: 3 });

    let data = [0u8; 5];
    assert!(ImageView::from_slice(&data, 2, 2).is_err());
}

#[test]
fn image_view_rows_follow_row_major_order() {
    let data: Vec<u8> = (0u8..12).collect();
    let view = ImageView::from_slice(&data, 4, 3).unwrap();
    assert_eq!(view.as_slice(), data.as_slice());

    let rows: Vec<&[u8]> = view.rows().collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1], &[4u8, 5, 6, 7]);

    let img = OwnedImage::new(data.clone(), 4, 3).unwrap();
    assert_eq!(img.view().rows().last().unwrap(), &[8u8, 9, 10, 11]);
}

#[test]
fn icon_size_defaults_and_validation() {
    let size = IconSize::default();
    assert_eq!((size.width, size.height), (160, 160));
    assert_eq!(size.area(), 160 * 160);
    assert!(IconSize::new(0, 10).is_err());
}

#[test]
fn color_image_crop_and_gray() {
    let img = ColorImage::from_fn(4, 3, |x, y| [(x * 10) as u8, (y * 10) as u8, 255]).unwrap();
    assert_eq!(img.size(), IconSize::new(4, 3).unwrap());

    let crop = img.crop(1, 1, 2, 2).unwrap();
    assert_eq!(crop.pixel(0, 0), [10, 10, 255]);
    assert_eq!(crop.pixel(1, 1), [20, 20, 255]);

    let err = img.crop(3, 0, 2, 1).err().unwrap();
    assert_eq!(
        err,
        IconMatchError::RoiOutOfBounds {
            x: 3,
            y: 0,
            width: 2,
            height: 1,
            img_width: 4,
            img_height: 3,
        }
    );

    let gray = ColorImage::filled(2, 2, [100, 100, 100]).unwrap().to_gray();
    assert_eq!(gray.data(), &[100u8; 4]);
    let white = ColorImage::filled(1, 1, [255, 255, 255]).unwrap().to_gray();
    assert_eq!(white.at(0, 0), 255);
}

#[test]
fn color_image_rejects_short_buffer() {
    assert!(ColorImage::new(vec![0u8; 11], 2, 2).is_err());
}

#[test]
fn resize_halves_by_area_average() {
    let data: Vec<u8> = (0u8..16).collect();
    let img = OwnedImage::new(data, 4, 4).unwrap();
    let half = resize_gray(&img, 2, 2).unwrap();
    assert_eq!(half.data(), &[3u8, 5, 11, 13]);
}

#[test]
fn template_plan_matches_known_stats() {
    let img = OwnedImage::new(vec![0u8, 1, 2, 3], 2, 2).unwrap();
    let plan = TemplatePlan::from_view(img.view()).unwrap();

    assert_eq!(plan.width(), 2);
    assert_eq!(plan.height(), 2);
    assert_eq!(plan.count(), 4);
    assert!((plan.mean() - 1.5).abs() < 1e-12);
    assert!((plan.var_sum() - 5.0).abs() < 1e-12);
    assert!((plan.energy() - 14.0).abs() < 1e-12);
    assert!(!plan.is_flat());

    let flat = OwnedImage::filled(3, 3, 7).unwrap();
    assert!(TemplatePlan::from_view(flat.view()).unwrap().is_flat());
}

#[test]
fn errors_render_readable_messages() {
    let err = IconMatchError::LibraryNotFound {
        path: "icons".to_string(),
    };
    assert_eq!(err.to_string(), "reference library not found: icons");
    assert_eq!(IconMatchError::EmptyQuery.to_string(), "empty query image");
}
