// tests/save_op.rs
//
// Пакетное сохранение (save_tensors / save_tensor_slices) и чтение обратно:
// 1) все типы элементов целиком;
// 2) слайсы больших тензоров: покрытие ровно сохранённой областью;
// 3) два слайса одного тензора в одном вызове + целый тензор рядом.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use QuiverCkpt::checkpoint::{
    save_tensor_slices_with_config, save_tensors_with_config, CheckpointReader,
};
use QuiverCkpt::{CkptConfig, Complex64, DataType, QInt32, QInt8, Tensor, TensorShape, TensorSlice};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_path(prefix: &str) -> Result<PathBuf> {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("qcktest-saveop-{prefix}-{pid}-{t}-{id}"));
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("ckpt"))
}

fn cfg() -> CkptConfig {
    CkptConfig::default().with_fsync(false)
}

fn fill<T>(n: usize, f: impl Fn(i32) -> T) -> Vec<T> {
    (0..n as i32).map(f).collect()
}

fn slice(s: &str) -> TensorSlice {
    s.parse().unwrap()
}

fn expect_tensor(r: &CheckpointReader, name: &str, dims: &[u64], dtype: DataType) {
    let (shape, t) = r.has_tensor(name).unwrap_or_else(|| panic!("{name} must exist"));
    assert!(shape.is_same_size(&TensorShape::from(dims)), "{name}: shape {shape}");
    assert_eq!(t, dtype, "{name}");
}

#[test]
fn all_types_roundtrip() -> Result<()> {
    let path = unique_path("simple")?;
    let names = [
        "tensor_bool",
        "tensor_int",
        "tensor_float",
        "tensor_double",
        "tensor_qint8",
        "tensor_qint32",
        "tensor_uint8",
        "tensor_int8",
        "tensor_int16",
        "tensor_string",
        "tensor_complex64",
        "tensor_int64",
    ];
    let tensors = vec![
        Tensor::from_vec([2u64], fill(2, |x| x != 0))?,
        Tensor::from_vec([10u64], fill(10, |x| x + 1))?,
        Tensor::from_vec([2u64, 4], fill(8, |x| x as f32 / 10.0))?,
        Tensor::from_vec([2u64, 4], fill(8, |x| x as f64 / 20.0))?,
        Tensor::from_vec([3u64, 2], fill(6, |x| QInt8(x as i8)))?,
        Tensor::from_vec([2u64, 3], fill(6, |x| QInt32(x * 2)))?,
        Tensor::from_vec([11u64], fill(11, |x| (x + 1) as u8))?,
        Tensor::from_vec([7u64], fill(7, |x| (x - 7) as i8))?,
        Tensor::from_vec([7u64], fill(7, |x| (x - 8) as i16))?,
        Tensor::from_vec([2u64], fill(2, |x| if x != 0 { "yes".to_string() } else { "no".to_string() }))?,
        Tensor::from_vec([2u64, 3], fill(6, |x| Complex64::new(100.0 + x as f32, 200.0 + x as f32)))?,
        Tensor::from_vec(TensorShape::scalar(), vec![-(1i64 << 40)])?,
    ];
    let summary = save_tensors_with_config(&path, &names, &tensors, cfg())?;
    assert_eq!(summary.tensors, names.len());
    assert_eq!(summary.fragments, names.len());

    let r = CheckpointReader::open_with_config(&path, cfg())?;
    assert_eq!(r.len(), names.len());

    expect_tensor(&r, "tensor_bool", &[2], DataType::Bool);
    let mut b = vec![false; 2];
    assert!(r.copy_slice_data("tensor_bool", &slice("-"), &mut b)?);
    assert_eq!(b, vec![false, true]);

    expect_tensor(&r, "tensor_int", &[10], DataType::Int32);
    let mut ints = vec![0i32; 10];
    assert!(r.copy_slice_data("tensor_int", &slice("-"), &mut ints)?);
    assert_eq!(ints, fill(10, |x| x + 1));

    expect_tensor(&r, "tensor_float", &[2, 4], DataType::Float);
    let mut fl = vec![0f32; 8];
    assert!(r.copy_slice_data("tensor_float", &slice("-:-"), &mut fl)?);
    for (i, v) in fl.iter().enumerate() {
        assert_eq!(*v, i as f32 / 10.0);
    }

    expect_tensor(&r, "tensor_double", &[2, 4], DataType::Double);
    let mut db = vec![0f64; 8];
    assert!(r.copy_slice_data("tensor_double", &slice("-:-"), &mut db)?);
    for (i, v) in db.iter().enumerate() {
        assert_eq!(*v, i as f64 / 20.0);
    }

    expect_tensor(&r, "tensor_qint8", &[3, 2], DataType::QInt8);
    let mut q8 = vec![QInt8::default(); 6];
    assert!(r.copy_slice_data("tensor_qint8", &slice("-:-"), &mut q8)?);
    assert_eq!(q8, fill(6, |x| QInt8(x as i8)));

    expect_tensor(&r, "tensor_qint32", &[2, 3], DataType::QInt32);
    let mut q32 = vec![QInt32::default(); 6];
    assert!(r.copy_slice_data("tensor_qint32", &slice("-:-"), &mut q32)?);
    assert_eq!(q32, fill(6, |x| QInt32(x * 2)));

    expect_tensor(&r, "tensor_uint8", &[11], DataType::UInt8);
    let mut u8s = vec![0u8; 11];
    assert!(r.copy_slice_data("tensor_uint8", &slice("-"), &mut u8s)?);
    assert_eq!(u8s, fill(11, |x| (x + 1) as u8));

    expect_tensor(&r, "tensor_int8", &[7], DataType::Int8);
    let mut i8s = vec![0i8; 7];
    assert!(r.copy_slice_data("tensor_int8", &slice("-"), &mut i8s)?);
    assert_eq!(i8s, fill(7, |x| (x - 7) as i8));

    expect_tensor(&r, "tensor_int16", &[7], DataType::Int16);
    let mut i16s = vec![0i16; 7];
    assert!(r.copy_slice_data("tensor_int16", &slice("-"), &mut i16s)?);
    assert_eq!(i16s, fill(7, |x| (x - 8) as i16));

    expect_tensor(&r, "tensor_string", &[2], DataType::String);
    let mut strs = vec![String::new(); 2];
    assert!(r.copy_slice_data("tensor_string", &slice("-"), &mut strs)?);
    assert_eq!(strs, vec!["no".to_string(), "yes".to_string()]);

    expect_tensor(&r, "tensor_complex64", &[2, 3], DataType::Complex64);
    let mut cs = vec![Complex64::default(); 6];
    assert!(r.copy_slice_data("tensor_complex64", &slice("-:-"), &mut cs)?);
    for (i, c) in cs.iter().enumerate() {
        assert_eq!(c.re, 100.0 + i as f32);
        assert_eq!(c.im, 200.0 + i as f32);
    }

    expect_tensor(&r, "tensor_int64", &[], DataType::Int64);
    let mut scalar = vec![0i64; 1];
    assert!(r.copy_slice_data("tensor_int64", &TensorSlice::full(0), &mut scalar)?);
    assert_eq!(scalar, vec![-(1i64 << 40)]);
    Ok(())
}

#[test]
fn saved_slices_cover_only_themselves() -> Result<()> {
    let path = unique_path("slices")?;
    let names = ["tensor_int", "tensor_float", "tensor_double", "tensor_qint8", "tensor_qint32"];
    let specs = ["10 -", "2 4 -:0,2", "2 4 0,1:2,2", "3 2 -:-", "2 3 1,1:2,1"];
    let tensors = vec![
        Tensor::from_vec([10u64], fill(10, |x| x + 1))?,
        Tensor::from_vec([2u64, 2], fill(4, |x| x as f32 / 10.0))?,
        Tensor::from_vec([1u64, 2], fill(2, |x| x as f64 / 20.0))?,
        Tensor::from_vec([3u64, 2], fill(6, |x| QInt8(x as i8)))?,
        Tensor::from_vec([1u64, 1], fill(1, |x| QInt32(x * 2)))?,
    ];
    save_tensor_slices_with_config(&path, &names, &specs, &tensors, cfg())?;
    let r = CheckpointReader::open_with_config(&path, cfg())?;

    expect_tensor(&r, "tensor_int", &[10], DataType::Int32);
    let mut ints = vec![0i32; 10];
    assert!(r.copy_slice_data("tensor_int", &slice("-"), &mut ints)?);

    expect_tensor(&r, "tensor_float", &[2, 4], DataType::Float);
    let mut full = vec![0f32; 8];
    let mut part = vec![0f32; 4];
    assert!(!r.copy_slice_data("tensor_float", &slice("-:-"), &mut full)?);
    assert!(r.copy_slice_data("tensor_float", &slice("-:0,2"), &mut part)?);
    assert_eq!(part, fill(4, |x| x as f32 / 10.0));

    expect_tensor(&r, "tensor_double", &[2, 4], DataType::Double);
    let mut full = vec![0f64; 8];
    let mut part = vec![0f64; 2];
    assert!(!r.copy_slice_data("tensor_double", &slice("-:-"), &mut full)?);
    assert!(r.copy_slice_data("tensor_double", &slice("0,1:2,2"), &mut part)?);
    assert_eq!(part, vec![0.0, 0.05]);

    expect_tensor(&r, "tensor_qint8", &[3, 2], DataType::QInt8);
    let mut q8 = vec![QInt8::default(); 6];
    assert!(r.copy_slice_data("tensor_qint8", &slice("-:-"), &mut q8)?);

    expect_tensor(&r, "tensor_qint32", &[2, 3], DataType::QInt32);
    let mut full = vec![QInt32::default(); 6];
    let mut one = vec![QInt32::default(); 1];
    assert!(!r.copy_slice_data("tensor_qint32", &slice("-:-"), &mut full)?);
    assert!(r.copy_slice_data("tensor_qint32", &slice("1,1:2,1"), &mut one)?);
    assert_eq!(one, vec![QInt32(0)]);
    Ok(())
}

#[test]
fn two_slices_of_one_tensor() -> Result<()> {
    let path = unique_path("two-slices")?;
    let names = ["four_by_sixteen", "four_by_sixteen", "small"];
    let specs = ["4 16 0,2:-", "4 16 2,2:-", ""];
    let tensors = vec![
        Tensor::from_vec([2u64, 16], fill(32, |x| x + 1))?,
        Tensor::from_vec([2u64, 16], fill(32, |x| 10 * (x + 1)))?,
        Tensor::from_vec([2u64, 4], fill(8, |x| x as f32 / 10.0))?,
    ];
    let summary = save_tensor_slices_with_config(&path, &names, &specs, &tensors, cfg())?;
    assert_eq!((summary.tensors, summary.fragments), (2, 3));

    let r = CheckpointReader::open_with_config(&path, cfg())?;
    expect_tensor(&r, "four_by_sixteen", &[4, 16], DataType::Int32);
    let mut whole = vec![0i32; 64];
    assert!(r.copy_slice_data("four_by_sixteen", &slice("-:-"), &mut whole)?);
    for (i, v) in whole[..32].iter().enumerate() {
        assert_eq!(*v, i as i32 + 1);
    }
    for (i, v) in whole[32..].iter().enumerate() {
        assert_eq!(*v, 10 * (i as i32 + 1));
    }

    // Область на стыке двух фрагментов.
    let mut seam = vec![0i32; 4];
    assert!(r.copy_slice_data("four_by_sixteen", &slice("1,2:14,2"), &mut seam)?);
    assert_eq!(seam, vec![31, 32, 150, 160]);

    let small = r.read_tensor("small")?.expect("small must be complete");
    assert_eq!(small.values::<f32>().unwrap(), fill(8, |x| x as f32 / 10.0).as_slice());
    Ok(())
}
