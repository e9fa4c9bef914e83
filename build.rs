use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Deserialize)]
struct Config {
    slab_size: usize,
    classes: Vec<usize>,
    max_slabs_per_heritage: u32,
    slab_alloc_batch: usize,
}

fn validate(cfg: &Config) {
    assert!(
        cfg.slab_size.is_power_of_two(),
        "slab_size ({}) must be a power of 2",
        cfg.slab_size
    );
    assert!(
        cfg.slab_size >= 4096,
        "slab_size ({}) must be >= 4096",
        cfg.slab_size
    );
    assert!(!cfg.classes.is_empty(), "classes must not be empty");
    assert!(cfg.classes.len() < 64, "too many classes (max 63, explicit)");
    for (i, &size) in cfg.classes.iter().enumerate() {
        assert!(size > 0, "class {i}: size must be > 0");
        assert!(size % 8 == 0, "class {i}: size {size} must be 8-byte aligned");
        if i > 0 {
            assert!(
                size > cfg.classes[i - 1],
                "class {i}: size {size} must be > previous size {}",
                cfg.classes[i - 1]
            );
        }
    }
    assert!(cfg.max_slabs_per_heritage > 0, "max_slabs_per_heritage must be > 0");
    assert!(cfg.slab_alloc_batch > 0, "slab_alloc_batch must be > 0");
}

fn classes_from_env(spec: &str) -> Vec<usize> {
    spec.split(',')
        .map(|s| s.trim().parse().expect("LINALLOC_CLASSES: not a valid size list"))
        .collect()
}

fn generate(cfg: &Config, out_path: &Path) {
    let mut code = String::from("// Auto-generated by build.rs. Do not edit.\n\n");
    code.push_str(&format!(
        "pub const SLAB_SIZE: usize = {};\n\
         pub const MAX_SLABS_PER_HERITAGE: u32 = {};\n\
         pub const SLAB_ALLOC_BATCH: usize = {};\n\n",
        cfg.slab_size, cfg.max_slabs_per_heritage, cfg.slab_alloc_batch,
    ));
    code.push_str(&format!(
        "pub static EXPLICIT_CLASSES: [usize; {}] = [\n",
        cfg.classes.len()
    ));
    for size in &cfg.classes {
        code.push_str(&format!("    {size},\n"));
    }
    code.push_str("];\n\n");

    // `Heritage` holds atomics and so is not `Copy`; an array-repeat
    // literal (`[Heritage::new(..); N]`) can't build this table. Emit a
    // literal list of N distinct `const` expressions instead, one poly
    // heritage per explicit class, each pointing at its own `TypeDesc`.
    code.push_str(&format!(
        "pub static POLY_TYPES: [crate::typedesc::TypeDesc; {}] = [\n",
        cfg.classes.len()
    ));
    for size in &cfg.classes {
        code.push_str(&format!(
            "    crate::typedesc::TypeDesc::new(\"poly-{size}\", {size}),\n"
        ));
    }
    code.push_str("];\n\n");

    code.push_str(&format!(
        "pub static POLY_HERITAGES: [crate::heritage::Heritage; {}] = [\n",
        cfg.classes.len()
    ));
    for i in 0..cfg.classes.len() {
        code.push_str(&format!(
            "    crate::heritage::Heritage::new(&POLY_TYPES[{i}], MAX_SLABS_PER_HERITAGE),\n"
        ));
    }
    code.push_str("];\n");

    fs::write(out_path, code).expect("failed to write config_gen.rs");
}

fn main() {
    println!("cargo:rerun-if-env-changed=LINALLOC_CONFIG");
    println!("cargo:rerun-if-env-changed=LINALLOC_CLASSES");

    let out_dir = env::var("OUT_DIR").unwrap();

    let content = match env::var("LINALLOC_CONFIG") {
        Ok(path) => {
            println!("cargo:rerun-if-changed={path}");
            fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {path}: {e}"))
        }
        Err(_) => {
            println!("cargo:rerun-if-changed=linalloc.toml");
            include_str!("linalloc.toml").to_string()
        }
    };

    let mut config: Config = toml::from_str(&content).expect("failed to parse TOML config");

    if let Ok(classes) = env::var("LINALLOC_CLASSES") {
        config.classes = classes_from_env(&classes);
    }

    validate(&config);
    generate(&config, &Path::new(&out_dir).join("config_gen.rs"));
}
