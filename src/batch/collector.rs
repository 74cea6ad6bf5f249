//! # 文件收集器
//!
//! 在计算目录中按文件名模式查找输出文件。
//!
//! ## 功能
//! - 支持单文件和目录输入
//! - glob 模式匹配（逗号分隔多模式）
//! - 可选递归搜索
//!
//! ## 依赖关系
//! - 被 `engine/immigrant.rs` 调用
//! - 使用 `walkdir` 遍历目录，`glob` 匹配文件名

use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 文件收集器
pub struct FileCollector {
    /// 输入路径
    input: PathBuf,
    /// 匹配模式列表
    patterns: Vec<Pattern>,
    /// 是否递归
    recursive: bool,
}

impl FileCollector {
    /// 创建新的文件收集器
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            patterns: vec![],
            recursive: false,
        }
    }

    /// 设置匹配模式（逗号分隔的多模式），无效模式被忽略
    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.patterns = pattern
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .filter_map(|s| Pattern::new(s).ok())
            .collect();
        self
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 收集所有匹配的文件，按路径排序
    pub fn collect(&self) -> Vec<PathBuf> {
        if self.input.is_file() {
            return vec![self.input.clone()];
        }

        if !self.input.is_dir() {
            return vec![];
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let mut files: Vec<PathBuf> = WalkDir::new(&self.input)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|entry| self.matches_patterns(entry.path()))
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();
        files
    }

    /// 最浅层的第一个匹配文件
    pub fn first(&self) -> Option<PathBuf> {
        self.collect()
            .into_iter()
            .min_by_key(|p| p.components().count())
    }

    /// 检查文件是否匹配任一模式；未设置模式时全部匹配
    fn matches_patterns(&self, path: &Path) -> bool {
        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };

        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_shallowest_match_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("relax")).unwrap();
        fs::write(dir.path().join("relax").join("OUTCAR"), "").unwrap();
        fs::write(dir.path().join("OUTCAR"), "").unwrap();
        fs::write(dir.path().join("OSZICAR"), "").unwrap();

        let collector = FileCollector::new(dir.path())
            .with_pattern("OUTCAR, OUTCAR.gz")
            .recursive(true);
        assert_eq!(collector.collect().len(), 2);
        assert_eq!(collector.first(), Some(dir.path().join("OUTCAR")));
    }

    #[test]
    fn test_non_recursive_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("POSCAR"), "").unwrap();

        let collector = FileCollector::new(dir.path()).with_pattern("POSCAR*");
        assert!(collector.collect().is_empty());
    }

    #[test]
    fn test_wildcards() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("POSCAR-001"), "").unwrap();
        fs::write(dir.path().join("POSCAR-002"), "").unwrap();
        fs::write(dir.path().join("CONTCAR"), "").unwrap();

        let found = FileCollector::new(dir.path()).with_pattern("POSCAR-00?").collect();
        assert_eq!(found.len(), 2);
    }
}
