//! # 文件收集器
//!
//! 根据输入路径收集力文件列表。
//!
//! ## 功能
//! - 单文件直接使用
//! - 含通配符的输入按 glob 展开（字典序）
//! - 目录递归搜索文件名匹配的文件（按路径排序）
//!
//! ## 依赖关系
//! - 被 `commands/post.rs` 调用
//! - 使用 `glob` 展开模式，`walkdir` 遍历目录

use crate::error::{PhononError, Result};

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 文件收集器
pub struct FileCollector {
    /// 输入路径或模式，按给定顺序处理
    inputs: Vec<String>,
    /// 目录搜索时的文件名模式
    patterns: Vec<String>,
}

impl FileCollector {
    pub fn new(inputs: Vec<String>) -> Self {
        Self {
            inputs,
            patterns: vec!["vasprun.xml".to_string()],
        }
    }

    /// 设置文件名模式（逗号分隔的多模式）
    pub fn with_pattern(mut self, pattern: &str) -> Self {
        let patterns: Vec<String> = pattern
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !patterns.is_empty() {
            self.patterns = patterns;
        }
        self
    }

    /// 收集所有匹配的文件
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for input in &self.inputs {
            let path = Path::new(input);
            if path.is_file() {
                files.push(path.to_path_buf());
            } else if path.is_dir() {
                files.extend(self.walk(path));
            } else if input.contains(['*', '?', '[']) {
                let mut matched: Vec<PathBuf> = glob::glob(input)
                    .map_err(|e| PhononError::InvalidArgument(format!("{}: {}", input, e)))?
                    .filter_map(|entry| entry.ok())
                    .filter(|p| p.is_file())
                    .collect();
                matched.sort();
                files.extend(matched);
            } else {
                return Err(PhononError::FileNotFound {
                    path: input.clone(),
                });
            }
        }

        if files.is_empty() {
            return Err(PhononError::NoFilesFound {
                pattern: self.inputs.join(" "),
            });
        }
        Ok(files)
    }

    fn walk(&self, dir: &Path) -> Vec<PathBuf> {
        WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|entry| self.matches_patterns(entry.path()))
            .map(|e| e.path().to_path_buf())
            .collect()
    }

    /// 检查文件是否匹配任一模式
    fn matches_patterns(&self, path: &Path) -> bool {
        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };

        self.patterns
            .iter()
            .any(|pattern| Self::glob_match(pattern, filename))
    }

    /// 简单 glob 匹配（支持 * 和 ? 通配符）
    fn glob_match(pattern: &str, text: &str) -> bool {
        let pattern = pattern.as_bytes();
        let text = text.as_bytes();

        let mut p = 0;
        let mut t = 0;
        let mut star_p = None;
        let mut star_t = 0;

        while t < text.len() {
            if p < pattern.len() && (pattern[p] == b'?' || pattern[p] == text[t]) {
                p += 1;
                t += 1;
            } else if p < pattern.len() && pattern[p] == b'*' {
                star_p = Some(p);
                star_t = t;
                p += 1;
            } else if let Some(sp) = star_p {
                p = sp + 1;
                star_t += 1;
                t = star_t;
            } else {
                return false;
            }
        }

        while p < pattern.len() && pattern[p] == b'*' {
            p += 1;
        }

        p == pattern.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_glob_match() {
        assert!(FileCollector::glob_match("vasprun.xml", "vasprun.xml"));
        assert!(FileCollector::glob_match("OUTCAR*", "OUTCAR"));
        assert!(FileCollector::glob_match("OUTCAR*", "OUTCAR-0003"));
        assert!(!FileCollector::glob_match("vasprun.xml", "vasprun.xml.bak"));
        assert!(FileCollector::glob_match("disp-00?", "disp-001"));
    }

    #[test]
    fn test_directory_walk_is_sorted() {
        let root = std::env::temp_dir().join(format!("interphon_collect_{}", std::process::id()));
        for name in ["disp-0002", "disp-0001", "disp-0010"] {
            let dir = root.join(name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("vasprun.xml"), "").unwrap();
            fs::write(dir.join("OUTCAR"), "").unwrap();
        }

        let files = FileCollector::new(vec![root.display().to_string()])
            .collect()
            .unwrap();
        let parents: Vec<String> = files
            .iter()
            .map(|p| p.parent().unwrap().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(parents, vec!["disp-0001", "disp-0002", "disp-0010"]);

        let outcars = FileCollector::new(vec![format!("{}/*/OUTCAR", root.display())])
            .collect()
            .unwrap();
        assert_eq!(outcars.len(), 3);
        assert!(outcars[0].ends_with("disp-0001/OUTCAR"));

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_input() {
        let err = FileCollector::new(vec!["/nonexistent/vasprun.xml".to_string()])
            .collect()
            .unwrap_err();
        assert!(matches!(err, PhononError::FileNotFound { .. }));
    }
}
