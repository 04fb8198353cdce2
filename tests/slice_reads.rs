// tests/slice_reads.rs
//
// Чтение областей через copy_slice_data:
// - частичное покрытие и под-слайсы сохранённого слайса;
// - объединение нескольких фрагментов (случайные разбиения, oorandom);
// - изоляция имён, идемпотентность, перекрытия (last-write-wins / strict_overlap);
// - ошибки валидации отделены от «не покрыто».

use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use oorandom::Rand64;

use QuiverCkpt::{
    error_kind, CheckpointReader, CheckpointWriter, CkptConfig, ErrorKind, TensorShape,
    TensorSlice,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_path(prefix: &str) -> Result<PathBuf> {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("qcktest-reads-{prefix}-{pid}-{t}-{id}"));
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("ckpt"))
}

fn cfg() -> CkptConfig {
    CkptConfig::default().with_fsync(false)
}

fn slice(s: &str) -> TensorSlice {
    s.parse().unwrap()
}

/// Значения фрагмента `sl` тензора формы `shape`, где элемент с линейным
/// индексом i (в полном тензоре) равен f(i).
fn fragment_values(shape: &TensorShape, sl: &TensorSlice, f: impl Fn(u64) -> i64) -> Vec<i64> {
    let full = TensorSlice::full(shape.rank());
    let lens = sl.lengths(shape);
    let lo: Vec<u64> = (0..shape.rank()).map(|d| sl.bounds(d, shape).0).collect();
    let n = sl.num_elements(shape) as usize;
    let mut out = Vec::with_capacity(n);
    let mut idx = vec![0u64; lens.len()];
    for _ in 0..n {
        let point: Vec<u64> = idx.iter().zip(&lo).map(|(a, b)| a + b).collect();
        out.push(f(full.relative_offset(shape, &point).unwrap()));
        for d in (0..idx.len()).rev() {
            idx[d] += 1;
            if idx[d] < lens[d] {
                break;
            }
            idx[d] = 0;
        }
    }
    out
}

#[test]
fn half_saved_float_tensor() -> Result<()> {
    let path = unique_path("half")?;
    let shape = TensorShape::from([2, 4]);
    let mut w = CheckpointWriter::create_with_config(&path, cfg())?;
    let vals: Vec<f32> = (0..4).map(|i| i as f32 / 10.0).collect();
    w.save("t", &shape, Some(&slice("-:0,2")), &vals)?;
    w.finish()?;

    let r = CheckpointReader::open_with_config(&path, cfg())?;
    let mut full = vec![7.0f32; 8];
    assert!(!r.copy_slice_data("t", &slice("-:-"), &mut full)?);
    assert!(full.iter().all(|&x| x == 7.0), "output must stay untouched");

    let mut buf = vec![0f32; 4];
    assert!(r.copy_slice_data("t", &slice("-:0,2"), &mut buf)?);
    for (i, v) in buf.iter().enumerate() {
        assert_eq!(*v, i as f32 / 10.0);
    }

    // Под-слайсы сохранённого слайса.
    let mut col = vec![0f32; 2];
    assert!(r.copy_slice_data("t", &slice("-:1,1"), &mut col)?);
    assert_eq!(col, vec![0.1, 0.3]);

    // Частично вне сохранённого.
    let mut straddle = vec![0f32; 4];
    assert!(!r.copy_slice_data("t", &slice("-:1,2"), &mut straddle)?);
    Ok(())
}

#[test]
fn random_tilings_read_back_whole() -> Result<()> {
    let mut rng = Rand64::new(0x5EED_2024);
    for round in 0..12 {
        let path = unique_path(&format!("tiling-{round}"))?;
        let rows = 1 + rng.rand_range(0..6);
        let cols = 1 + rng.rand_range(0..9);
        let shape = TensorShape::from([rows, cols]);
        let value = |i: u64| (i as i64) * 3 - 5;

        // Нарезка на полосы по строкам, каждая полоса: на куски по колонкам.
        let mut w = CheckpointWriter::create_with_config(&path, cfg())?;
        let mut tiles = Vec::new();
        let mut r0 = 0;
        while r0 < rows {
            let rh = 1 + rng.rand_range(0..(rows - r0));
            let mut c0 = 0;
            while c0 < cols {
                let cw = 1 + rng.rand_range(0..(cols - c0));
                let tile = TensorSlice::from_bounds(&shape, &[(r0, r0 + rh), (c0, c0 + cw)]);
                w.save("m", &shape, Some(&tile), &fragment_values(&shape, &tile, value))?;
                tiles.push(tile);
                c0 += cw;
            }
            r0 += rh;
        }
        // Шум под другим именем той же формы.
        w.save("noise", &shape, None, &vec![i64::MIN; (rows * cols) as usize])?;
        w.finish()?;

        let r = CheckpointReader::open_with_config(&path, cfg())?;
        assert_eq!(r.slice_set("m").unwrap().fragments().len(), tiles.len());

        let mut whole = vec![0i64; (rows * cols) as usize];
        assert!(r.copy_slice_data("m", &TensorSlice::full(2), &mut whole)?);
        let expect: Vec<i64> = (0..rows * cols).map(value).collect();
        assert_eq!(whole, expect, "round {round}: {} tiles", tiles.len());

        // Случайная под-область.
        let a0 = rng.rand_range(0..rows);
        let a1 = a0 + 1 + rng.rand_range(0..(rows - a0));
        let b0 = rng.rand_range(0..cols);
        let b1 = b0 + 1 + rng.rand_range(0..(cols - b0));
        let sub = TensorSlice::from_bounds(&shape, &[(a0, a1), (b0, b1)]);
        let mut got = vec![0i64; sub.num_elements(&shape) as usize];
        assert!(r.copy_slice_data("m", &sub, &mut got)?);
        assert_eq!(got, fragment_values(&shape, &sub, value), "round {round}: sub {sub}");

        // Повторное чтение даёт то же самое.
        let mut again = vec![0i64; got.len()];
        assert!(r.copy_slice_data("m", &sub, &mut again)?);
        assert_eq!(again, got);
    }
    Ok(())
}

#[test]
fn missing_tile_fails_coverage() -> Result<()> {
    let path = unique_path("missing")?;
    let shape = TensorShape::from([4, 4]);
    let mut w = CheckpointWriter::create_with_config(&path, cfg())?;
    // Все квадранты, кроме правого нижнего.
    for spec in ["0,2:0,2", "0,2:2,2", "2,2:0,2"] {
        let s = slice(spec);
        w.save("q", &shape, Some(&s), &fragment_values(&shape, &s, |i| i as i64))?;
    }
    w.finish()?;

    let r = CheckpointReader::open_with_config(&path, cfg())?;
    let mut whole = vec![0i64; 16];
    assert!(!r.copy_slice_data("q", &slice("-:-"), &mut whole)?);
    let mut corner = vec![0i64; 1];
    assert!(!r.copy_slice_data("q", &slice("3,1:3,1"), &mut corner)?);
    let mut top = vec![0i64; 8];
    assert!(r.copy_slice_data("q", &slice("0,2:-"), &mut top)?);
    assert_eq!(top, (0..8).collect::<Vec<i64>>());
    let mut left = vec![0i64; 8];
    assert!(r.copy_slice_data("q", &slice("-:0,2"), &mut left)?);
    assert_eq!(left, vec![0, 1, 4, 5, 8, 9, 12, 13]);
    Ok(())
}

#[test]
fn names_are_isolated() -> Result<()> {
    let path = unique_path("names")?;
    let shape = TensorShape::from([3]);
    let mut w = CheckpointWriter::create_with_config(&path, cfg())?;
    w.save("a", &shape, Some(&slice("0,2")), &[1i32, 2])?;
    w.save("ab", &shape, None, &[7i32, 8, 9])?;
    w.save("a/b", &shape, Some(&slice("2,1")), &[3i32])?;
    w.finish()?;

    let r = CheckpointReader::open_with_config(&path, cfg())?;
    assert_eq!(r.tensor_names().collect::<Vec<_>>(), vec!["a", "a/b", "ab"]);
    // Фрагменты "ab" и "a/b" не закрывают дыру в "a".
    let mut buf = vec![0i32; 3];
    assert!(!r.copy_slice_data("a", &slice("-"), &mut buf)?);
    assert!(!r.copy_slice_data("b", &slice("-"), &mut buf)?);
    assert!(r.has_tensor("b").is_none());
    assert!(r.copy_slice_data("ab", &slice("-"), &mut buf)?);
    assert_eq!(buf, vec![7, 8, 9]);
    Ok(())
}

#[test]
fn overlap_last_registration_wins() -> Result<()> {
    let path = unique_path("overlap")?;
    let shape = TensorShape::from([2, 4]);
    let mut w = CheckpointWriter::create_with_config(&path, cfg())?;
    w.save("t", &shape, None, &[1u8; 8])?;
    w.save("t", &shape, Some(&slice("-:1,2")), &[2u8; 4])?;
    w.save("t", &shape, Some(&slice("1,1:2,2")), &[3u8; 2])?;
    // Повтор того же слайса заменяет значение.
    w.save("t", &shape, Some(&slice("1,1:2,2")), &[4u8; 2])?;
    let s = w.finish()?;
    assert_eq!(s.fragments, 3);

    let r = CheckpointReader::open_with_config(&path, cfg())?;
    let mut buf = vec![0u8; 8];
    assert!(r.copy_slice_data("t", &slice("-:-"), &mut buf)?);
    assert_eq!(buf, vec![1, 2, 2, 1, 1, 2, 4, 4]);
    Ok(())
}

#[test]
fn strict_overlap_rejects_at_write_time() -> Result<()> {
    let path = unique_path("strict")?;
    let shape = TensorShape::from([2, 4]);
    let mut w = CheckpointWriter::create_with_config(&path, cfg().with_strict_overlap(true))?;
    w.save("t", &shape, Some(&slice("-:0,2")), &[0f64; 4])?;
    let e = w.save("t", &shape, Some(&slice("1,1:1,2")), &[0f64; 2]).unwrap_err();
    assert_eq!(error_kind(&e), ErrorKind::Validation);
    // Writer не отравлен: соседний слайс проходит.
    w.save("t", &shape, Some(&slice("-:2,2")), &[1f64; 4])?;
    w.finish()?;

    let r = CheckpointReader::open_with_config(&path, cfg())?;
    assert_eq!(r.slice_set("t").unwrap().fragments().len(), 2);
    Ok(())
}

#[test]
fn invalid_requests_are_errors_not_misses() -> Result<()> {
    let path = unique_path("invalid")?;
    let shape = TensorShape::from([2, 4]);
    let mut w = CheckpointWriter::create_with_config(&path, cfg())?;
    w.save("t", &shape, None, &[0i16; 8])?;
    w.finish()?;

    let r = CheckpointReader::open_with_config(&path, cfg())?;
    let mut buf = vec![0i16; 8];
    for bad in ["-", "-:-:-", "-:2,3", "2,1:-"] {
        let e = r.copy_slice_data("t", &slice(bad), &mut buf).unwrap_err();
        assert_eq!(error_kind(&e), ErrorKind::Validation, "slice {bad}");
    }
    let mut short = vec![0i16; 7];
    let e = r.copy_slice_data("t", &slice("-:-"), &mut short).unwrap_err();
    assert_eq!(error_kind(&e), ErrorKind::Validation);

    let mut wrong = vec![0i32; 8];
    let e = r.copy_slice_data("t", &slice("-:-"), &mut wrong).unwrap_err();
    assert_eq!(error_kind(&e), ErrorKind::ShapeOrTypeMismatch);

    // Отсутствующее имя: не ошибка.
    assert!(!r.copy_slice_data("nope", &slice("-:-"), &mut buf)?);
    Ok(())
}

#[test]
fn empty_tensor_is_trivially_covered() -> Result<()> {
    let path = unique_path("empty")?;
    let shape = TensorShape::from([0, 3]);
    let mut w = CheckpointWriter::create_with_config(&path, cfg())?;
    w.save::<f32>("e", &shape, None, &[])?;
    w.finish()?;

    let r = CheckpointReader::open_with_config(&path, cfg())?;
    let mut none: Vec<f32> = Vec::new();
    assert!(r.copy_slice_data("e", &slice("-:-"), &mut none)?);
    let t = r.read_tensor("e")?.unwrap();
    assert_eq!(t.shape(), &shape);
    Ok(())
}

#[test]
fn reader_is_shared_across_threads() -> Result<()> {
    let path = unique_path("threads")?;
    let shape = TensorShape::from([8, 8]);
    let mut w = CheckpointWriter::create_with_config(&path, cfg())?;
    for r0 in (0..8).step_by(2) {
        let s = TensorSlice::from_bounds(&shape, &[(r0, r0 + 2), (0, 8)]);
        w.save("g", &shape, Some(&s), &fragment_values(&shape, &s, |i| i as i64))?;
    }
    w.finish()?;

    let r = std::sync::Arc::new(CheckpointReader::open_with_config(&path, cfg())?);
    let mut handles = Vec::new();
    for k in 0..4u64 {
        let r = r.clone();
        handles.push(std::thread::spawn(move || -> Result<Vec<i64>> {
            let s = TensorSlice::from_bounds(&TensorShape::from([8, 8]), &[(k, k + 3), (k, k + 2)]);
            let mut buf = vec![0i64; 6];
            assert!(r.copy_slice_data("g", &s, &mut buf)?);
            Ok(buf)
        }));
    }
    for (k, h) in handles.into_iter().enumerate() {
        let got = h.join().expect("thread panicked")?;
        let k = k as i64;
        let expect: Vec<i64> = (0..3)
            .flat_map(|dr| (0..2).map(move |dc| (k + dr) * 8 + k + dc))
            .collect();
        assert_eq!(got, expect);
    }
    Ok(())
}
