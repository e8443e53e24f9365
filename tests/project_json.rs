use std::io::Cursor;
use std::path::PathBuf;

use wraplab::{LayerSpec, Project};

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "wraplab_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn write_png(path: &PathBuf, w: u32, h: u32, px: [u8; 4]) {
    let mut img = image::RgbaImage::new(w, h);
    for p in img.pixels_mut() {
        *p = image::Rgba(px);
    }
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(path, &buf).unwrap();
}

#[test]
fn materialize_builds_template_and_layers() {
    let tmp = temp_dir("materialize");
    std::fs::create_dir_all(&tmp).unwrap();
    write_png(&tmp.join("van.png"), 16, 10, [20, 20, 20, 255]);
    write_png(&tmp.join("art.png"), 8, 8, [255, 0, 0, 255]);

    let json = r##"{
        "template": "van.png",
        "model": "van",
        "layers": [
            { "kind": "fill", "color": "#00ff00" },
            { "kind": "image", "source": "art.png", "opacity": 0.75 }
        ]
    }"##;
    let project_path = tmp.join("project.json");
    std::fs::write(&project_path, json).unwrap();

    let project = Project::load(&project_path).unwrap();
    let (template, stack) = project.materialize(&tmp).unwrap();

    assert_eq!((template.width(), template.height()), (16, 10));
    assert_eq!(stack.len(), 2);
    assert_eq!(stack.selected_index(), None);

    assert!(stack.layers()[0].is_recolorable());
    let image = &stack.layers()[1];
    assert_eq!(image.opacity, 0.75);
    // no placement given: fitted to the template and centered
    let p = image.placement;
    assert!((p.scale - 1.25).abs() < 1e-12); // min(16/8, 10/8)
    assert_eq!((p.x, p.y), (8.0, 5.0));

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn explicit_placement_overrides_the_fit() {
    let tmp = temp_dir("placement");
    std::fs::create_dir_all(&tmp).unwrap();
    write_png(&tmp.join("t.png"), 16, 16, [0, 0, 0, 255]);
    write_png(&tmp.join("a.png"), 4, 4, [255, 255, 255, 255]);

    let json = r##"{
        "template": "t.png",
        "layers": [
            { "kind": "image", "source": "a.png",
              "placement": { "x": 3.0, "y": 12.0, "scale": 2.0, "rotation_deg": 45.0 } }
        ]
    }"##;
    let project_path = tmp.join("p.json");
    std::fs::write(&project_path, json).unwrap();

    let (_, stack) = Project::load(&project_path).unwrap().materialize(&tmp).unwrap();
    let p = stack.layers()[0].placement;
    assert_eq!((p.x, p.y, p.scale, p.rotation_deg), (3.0, 12.0, 2.0, 45.0));

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn fill_regions_spec_yields_one_layer_per_region() {
    let tmp = temp_dir("regions");
    std::fs::create_dir_all(&tmp).unwrap();

    // two opaque squares separated by transparency
    let mut img = image::RgbaImage::new(20, 8);
    for y in 0..8u32 {
        for x in 0..20u32 {
            let a = if x < 8 || x >= 12 { 255 } else { 0 };
            img.put_pixel(x, y, image::Rgba([50, 50, 50, a]));
        }
    }
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(tmp.join("t.png"), &buf).unwrap();

    let json = r##"{
        "template": "t.png",
        "layers": [ { "kind": "fill_regions", "color": "#112233" } ]
    }"##;
    let project_path = tmp.join("p.json");
    std::fs::write(&project_path, json).unwrap();

    let (_, stack) = Project::load(&project_path).unwrap().materialize(&tmp).unwrap();
    assert_eq!(stack.len(), 2);
    assert!(stack.layers().iter().all(|l| l.is_recolorable()));

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn load_rejects_invalid_documents() {
    let tmp = temp_dir("invalid");
    std::fs::create_dir_all(&tmp).unwrap();

    let bad = tmp.join("bad.json");
    std::fs::write(&bad, r#"{ "template": "t.png", "layers": [ { "kind": "nope" } ] }"#).unwrap();
    assert!(Project::load(&bad).is_err());

    let empty = tmp.join("empty.json");
    std::fs::write(&empty, r#"{ "template": "" }"#).unwrap();
    assert!(Project::load(&empty).is_err());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn serialization_writes_hex_colors_and_tagged_kinds() {
    let project = Project {
        template: "t.png".into(),
        model: None,
        layers: vec![LayerSpec::Fill {
            color: wraplab::Rgb::new(17, 34, 51),
        }],
    };
    let s = serde_json::to_string(&project).unwrap();
    assert!(s.contains(r##""color":"#112233""##));
    assert!(s.contains(r#""kind":"fill""#));
}
