use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::{
    config::InventoryMode,
    error::{AppError, AppResult},
    models::{InventoryReport, ServiceRecord},
};

const DEPENDENCY_HEADER: [&str; 4] = ["folderPath", "serviceName", "serviceId", "resolutionPath"];
const QUERY_HEADER: [&str; 3] = ["folderPath", "name", "resolutionPath"];

/// 导出生成的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFiles {
    pub csv: PathBuf,
    pub summary: PathBuf,
}

/// 写出 CSV 和运行摘要
pub fn export_report<P: AsRef<Path>>(report: &InventoryReport, csv_path: P) -> AppResult<ExportedFiles> {
    let csv_path = csv_path.as_ref();
    write_csv(report, csv_path)?;
    let summary = summary_path(csv_path);
    write_summary(report, csv_path, &summary)?;

    info!(
        csv = %csv_path.display(),
        summary = %summary.display(),
        records = report.records.len(),
        "盘点结果已导出"
    );
    Ok(ExportedFiles {
        csv: csv_path.to_path_buf(),
        summary,
    })
}

/// 按模式选择列；缺失的 resolutionPath 写为 N/A
pub fn write_csv<P: AsRef<Path>>(report: &InventoryReport, path: P) -> AppResult<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::sink(path.display().to_string(), e))?;

    match report.mode {
        InventoryMode::Dependency => {
            writer.write_record(DEPENDENCY_HEADER)?;
            for record in &report.records {
                writer.write_record(dependency_row(record))?;
            }
        }
        InventoryMode::Query => {
            writer.write_record(QUERY_HEADER)?;
            for record in &report.records {
                writer.write_record([
                    record.folder_path.as_str(),
                    record.name.as_str(),
                    record.resolution_path_or_na(),
                ])?;
            }
        }
    }

    writer
        .flush()
        .map_err(|e| AppError::sink(path.display().to_string(), e))
}

fn dependency_row(record: &ServiceRecord) -> [&str; 4] {
    [
        record.folder_path.as_str(),
        record.name.as_str(),
        record.service_id.as_deref().unwrap_or_default(),
        record.resolution_path_or_na(),
    ]
}

/// `inventory.csv` -> `inventory_log.txt`
pub fn summary_path(csv_path: &Path) -> PathBuf {
    let stem = csv_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "inventory".to_string());
    csv_path.with_file_name(format!("{}_log.txt", stem))
}

pub fn write_summary(report: &InventoryReport, csv_path: &Path, summary: &Path) -> AppResult<()> {
    ensure_parent_dir(summary)?;
    fs::write(summary, render_summary(report, csv_path))
        .map_err(|e| AppError::sink(summary.display().to_string(), e))
}

/// 运行摘要正文
pub fn render_summary(report: &InventoryReport, csv_path: &Path) -> String {
    let mut out = String::new();
    let fmt = "%Y-%m-%d %H:%M:%S";

    let _ = writeln!(out, "盘点模式: {}", report.mode);
    let _ = writeln!(out, "开始时间: {}", report.started_at.format(fmt));
    let _ = writeln!(out, "结束时间: {}", report.finished_at.format(fmt));
    let _ = writeln!(out, "耗时: {:.1} 秒", report.elapsed().as_secs_f64());
    let _ = writeln!(out, "CSV 文件: {}", csv_path.display());
    let _ = writeln!(out, "处理的文件夹数: {}", report.visited_folders);
    let _ = writeln!(out, "唯一API数: {}", report.records.len());
    if report.cancelled {
        let _ = writeln!(out, "状态: 已取消（结果不完整）");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "空文件夹 ({}):", report.empty_folders.len());
    for path in &report.empty_folders {
        let _ = writeln!(out, "  {}", path);
    }

    if !report.unresolved_roots.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "未匹配的根文件夹 ({}):", report.unresolved_roots.len());
        for target in &report.unresolved_roots {
            let _ = writeln!(out, "  {}", target);
        }
    }

    if !report.failed_folders.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "获取失败的文件夹 ({}):", report.failed_folders.len());
        for failed in &report.failed_folders {
            let _ = writeln!(out, "  {}: {}", failed.path, failed.error);
        }
    }
    out
}

fn ensure_parent_dir(path: &Path) -> AppResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::sink(parent.display().to_string(), e))
        }
        _ => Ok(()),
    }
}
