use wraplab::{segment_regions, AlphaMask, Rgb, DEFAULT_THRESHOLD};

fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn digest_u64(bytes: &[u8]) -> u64 {
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    for chunk in bytes.chunks(8) {
        let mut v = 0u64;
        for (i, &b) in chunk.iter().enumerate() {
            v |= (b as u64) << (i * 8);
        }
        state = mix64(state ^ v);
    }
    state
}

const RED: Rgb = Rgb::new(255, 0, 0);

/// Two opaque blobs joined by a bridge of the given width, on a 32x16 mask.
fn bridged_mask(bridge_rows: u32) -> AlphaMask {
    let (w, h) = (32u32, 16u32);
    let mut data = vec![0u8; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            let in_left = x < 12;
            let in_right = x >= 20;
            let in_bridge = (12..20).contains(&x) && y < bridge_rows;
            if in_left || in_right || in_bridge {
                data[(y * w + x) as usize] = 255;
            }
        }
    }
    AlphaMask::from_bytes(w, h, data).unwrap()
}

#[test]
fn one_pixel_bridge_erodes_into_two_regions() {
    let mask = bridged_mask(1);
    let regions = segment_regions(&mask, DEFAULT_THRESHOLD, RED).unwrap();
    assert_eq!(regions.len(), 2);
    // bridge pixels get shared out between the two regions, but each blob
    // stays whole: one region owns the left edge, the other the right
    assert_eq!(regions[0].bounds.min_x, 0);
    assert_eq!(regions[1].bounds.max_x, 31);
    assert!(regions[0].bounds.width() >= 12);
    assert!(regions[1].bounds.width() >= 12);
}

#[test]
fn wide_bridge_survives_erosion_as_one_region() {
    let mask = bridged_mask(16);
    let regions = segment_regions(&mask, DEFAULT_THRESHOLD, RED).unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].bounds.width(), 32);
}

#[test]
fn regions_partition_the_thresholded_mask() {
    let mask = bridged_mask(1);
    let threshold = DEFAULT_THRESHOLD;
    let regions = segment_regions(&mask, threshold, RED).unwrap();

    // every thresholded-opaque pixel lands in exactly one region raster
    let (w, h) = (mask.width(), mask.height());
    let mut claimed = vec![0u32; (w * h) as usize];
    for region in &regions {
        let b = &region.bounds;
        for ry in 0..region.raster.height() {
            for rx in 0..region.raster.width() {
                if region.raster.pixel(rx, ry)[3] > 0 {
                    claimed[((b.min_y + ry) * w + (b.min_x + rx)) as usize] += 1;
                }
            }
        }
    }
    for y in 0..h {
        for x in 0..w {
            let opaque = mask.alpha(x, y) >= threshold;
            let n = claimed[(y * w + x) as usize];
            assert_eq!(n, u32::from(opaque), "pixel ({x}, {y})");
        }
    }
}

#[test]
fn region_rasters_carry_fill_color_and_source_alpha() {
    let mask = bridged_mask(16);
    let regions = segment_regions(&mask, DEFAULT_THRESHOLD, Rgb::new(0, 128, 64)).unwrap();
    let px = regions[0].raster.pixel(0, 0);
    assert_eq!(px, [0, 128, 64, 255]);
}

#[test]
fn segmentation_is_deterministic() {
    let mask = bridged_mask(1);
    let digest = |regions: &[wraplab::Region]| {
        let mut d = 0u64;
        for r in regions {
            d = mix64(d ^ u64::from(r.label));
            d ^= digest_u64(r.raster.data());
        }
        d
    };
    let a = segment_regions(&mask, DEFAULT_THRESHOLD, RED).unwrap();
    let b = segment_regions(&mask, DEFAULT_THRESHOLD, RED).unwrap();
    assert_eq!(a.len(), b.len());
    assert_eq!(digest(&a), digest(&b));
}

#[test]
fn labels_follow_raster_scan_order() {
    let mask = bridged_mask(1);
    let regions = segment_regions(&mask, DEFAULT_THRESHOLD, RED).unwrap();
    for (i, r) in regions.iter().enumerate() {
        assert_eq!(r.label, (i + 1) as u32);
    }
    // left blob's seed is scanned first
    assert!(regions[0].bounds.min_x < regions[1].bounds.min_x);
}

#[test]
fn orphaned_sliver_is_excluded_from_every_region() {
    // an 8x8 blob that survives erosion plus one isolated opaque pixel:
    // the pixel has no surviving seed and no path to the blob, so it
    // stays unlabeled
    let (w, h) = (16u32, 16u32);
    let mut data = vec![0u8; (w * h) as usize];
    for y in 2..10u32 {
        for x in 2..10u32 {
            data[(y * w + x) as usize] = 255;
        }
    }
    data[(14 * w + 14) as usize] = 255;
    let mask = AlphaMask::from_bytes(w, h, data).unwrap();

    let regions = segment_regions(&mask, DEFAULT_THRESHOLD, RED).unwrap();
    assert_eq!(regions.len(), 1);
    let b = &regions[0].bounds;
    assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (2, 2, 9, 9));
    // the sliver pixel lands in no region raster
    for region in &regions {
        let rb = &region.bounds;
        let inside = (rb.min_x..=rb.max_x).contains(&14) && (rb.min_y..=rb.max_y).contains(&14);
        assert!(!inside);
    }
}

#[test]
fn fully_transparent_mask_is_an_error() {
    let mask = AlphaMask::from_bytes(4, 4, vec![0; 16]).unwrap();
    assert!(segment_regions(&mask, DEFAULT_THRESHOLD, RED).is_err());
}
