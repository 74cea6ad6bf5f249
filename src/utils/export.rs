//! # 声子曲线导出
//!
//! 将热力学性质、DOS、PDOS 与能带导出为 CSV。
//!
//! ## 依赖关系
//! - 被 `workflow/outputs.rs` 调用
//! - 使用 `models/phonon.rs`
//! - 使用 `csv` 库写入 CSV 文件

use crate::error::{PhonoflowError, Result};
use crate::models::{BandStructure, Dos, Pdos, ThermalProperties};

use std::path::Path;

fn finish(mut wtr: csv::Writer<std::fs::File>, output_path: &Path) -> Result<()> {
    wtr.flush().map_err(|e| PhonoflowError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })
}

/// 导出热力学性质
pub fn thermal_to_csv(tp: &ThermalProperties, output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    wtr.write_record([
        "temperature_K",
        "free_energy_kJ_mol",
        "entropy_J_K_mol",
        "heat_capacity_J_K_mol",
    ])?;

    for i in 0..tp.temperatures.len() {
        let at = |v: &Vec<f64>| v.get(i).map(|x| format!("{:.6}", x)).unwrap_or_default();
        wtr.write_record([
            format!("{:.2}", tp.temperatures[i]),
            at(&tp.free_energy),
            at(&tp.entropy),
            at(&tp.heat_capacity),
        ])?;
    }
    finish(wtr, output_path)
}

/// 导出总态密度
pub fn dos_to_csv(dos: &Dos, output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    wtr.write_record(["frequency_THz", "dos"])?;
    for (f, d) in dos.frequencies.iter().zip(&dos.total_dos) {
        wtr.write_record([format!("{:.6}", f), format!("{:.8}", d)])?;
    }
    finish(wtr, output_path)
}

/// 导出投影态密度，每组原子一列
pub fn pdos_to_csv(pdos: &Pdos, output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    let mut header = vec!["frequency_THz".to_string()];
    header.extend((1..=pdos.projected_dos.len()).map(|i| format!("pdos_{}", i)));
    wtr.write_record(&header)?;

    for (i, f) in pdos.frequencies.iter().enumerate() {
        let mut row = vec![format!("{:.6}", f)];
        row.extend(
            pdos.projected_dos
                .iter()
                .map(|col| col.get(i).map(|v| format!("{:.8}", v)).unwrap_or_default()),
        );
        wtr.write_record(&row)?;
    }
    finish(wtr, output_path)
}

/// 导出能带：每个 q 点一行，每条能带一列
pub fn band_to_csv(band: &BandStructure, output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    let mut header = vec![
        "distance".to_string(),
        "qx".to_string(),
        "qy".to_string(),
        "qz".to_string(),
    ];
    header.extend((1..=band.num_bands()).map(|i| format!("band_{}", i)));
    wtr.write_record(&header)?;

    for ((d, q), freqs) in band.distances.iter().zip(&band.qpoints).zip(&band.frequencies) {
        let mut row = vec![
            format!("{:.6}", d),
            format!("{:.6}", q[0]),
            format!("{:.6}", q[1]),
            format!("{:.6}", q[2]),
        ];
        row.extend(freqs.iter().map(|f| format!("{:.6}", f)));
        wtr.write_record(&row)?;
    }
    finish(wtr, output_path)
}
