//! # 参数文件与运行设置
//!
//! 参数文件为 `key = value` 行，键不区分大小写并接受简写别名，
//! 不含 `=` 的行以及 `#` 之后的内容忽略。命令行的值优先于参数文件，
//! 两者都没有时使用默认值，最终校验为 `PreSettings` / `PostSettings`。
//!
//! | 键 | 别名 |
//! |----|------|
//! | `dft_code` | `dft` |
//! | `displacement` | `disp` |
//! | `enlargement` | `enlarge` |
//! | `periodicity` | `pbc` |
//! | `unitcell` | `c` |
//! | `supercell` | `sc` |
//! | `forces` | `fc` |
//! | `kpoint_dos` | `kdos` |
//! | `sigma` | `sig` |
//! | `number_dos` | `ndos` |
//! | `energy_limit` | `elimit` |
//! | `temperature_minimum` | `tmin` |
//! | `temperature_maximum` | `tmax` |
//! | `temperature_step` | `tstep` |
//! | `kpoint_band` | `kband` |
//! | `kpoint_label_band` | `k_label_band` |
//! | `index_mode` | `ind_mode` |
//! | `k_point_mode` | `kpt_mode` |
//!
//! ## 依赖关系
//! - 被 `commands/pre.rs`, `commands/post.rs` 使用
//! - 使用 `cli/` 的参数结构, `models/structure.rs`

use crate::cli::post::PostArgs;
use crate::cli::pre::{CellArgs, PreArgs};
use crate::error::{PhononError, Result};
use crate::models::{Enlargement, Periodicity};
use crate::phonon::EigenSolver;
use crate::plot::PlotOptions;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// 默认位移 (Å)
pub const DEFAULT_DISPLACEMENT: f64 = 0.01;
pub const DEFAULT_ENLARGEMENT: &str = "1 1 1";
pub const DEFAULT_PERIODICITY: &str = "1 1 0";
pub const DEFAULT_SIGMA: f64 = 0.1;
pub const DEFAULT_NUM_DOS: usize = 200;
pub const DEFAULT_FORCE_PATTERN: &str = "vasprun.xml";

/// 别名 -> 规范键
const ALIASES: &[(&str, &str)] = &[
    ("dft", "dft_code"),
    ("disp", "displacement"),
    ("enlarge", "enlargement"),
    ("pbc", "periodicity"),
    ("c", "unitcell"),
    ("sc", "supercell"),
    ("fc", "forces"),
    ("kdos", "kpoint_dos"),
    ("sig", "sigma"),
    ("ndos", "number_dos"),
    ("elimit", "energy_limit"),
    ("tmin", "temperature_minimum"),
    ("tmax", "temperature_maximum"),
    ("tstep", "temperature_step"),
    ("kband", "kpoint_band"),
    ("k_label_band", "kpoint_label_band"),
    ("ind_mode", "index_mode"),
    ("kpt_mode", "k_point_mode"),
];

fn canonical(key: &str) -> String {
    let key = key.trim().to_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, name)| name.to_string())
        .unwrap_or(key)
}

// ─────────────────────────────────────────────────────────────
// 参数文件
// ─────────────────────────────────────────────────────────────

/// 解析后的参数文件
#[derive(Debug, Clone, Default)]
pub struct ArgumentFile {
    entries: HashMap<String, String>,
}

impl ArgumentFile {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PhononError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = fs::read_to_string(path).map_err(|e| PhononError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(Self::parse(&content))
    }

    /// 有路径则读取，否则为空
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn parse(content: &str) -> Self {
        let mut entries = HashMap::new();
        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("");
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            if key.trim().is_empty() || value.is_empty() {
                continue;
            }
            entries.insert(canonical(key), value.to_string());
        }
        ArgumentFile { entries }
    }

    /// 按规范键或别名取值
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&canonical(key)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| {
                PhononError::InvalidArgument(format!("cannot parse '{}' for '{}'", raw, key))
            }),
        }
    }

    fn flag(&self, key: &str) -> Result<bool> {
        match self.get(key).map(str::to_lowercase).as_deref() {
            None => Ok(false),
            Some("true" | ".true." | "t" | "yes" | "on" | "1") => Ok(true),
            Some("false" | ".false." | "f" | "no" | "off" | "0") => Ok(false),
            Some(other) => Err(PhononError::InvalidArgument(format!(
                "'{}' expects true/false, got '{}'",
                key, other
            ))),
        }
    }
}

/// 命令行优先，其次参数文件
fn merge<T: FromStr>(cli: Option<T>, file: &ArgumentFile, key: &str) -> Result<Option<T>> {
    match cli {
        Some(v) => Ok(Some(v)),
        None => file.parsed(key),
    }
}

fn merge_text(cli: Option<&str>, file: &ArgumentFile, key: &str) -> Option<String> {
    cli.map(str::to_string)
        .or_else(|| file.get(key).map(str::to_string))
}

fn parse_floats(input: &str, expected: usize, what: &str) -> Result<Vec<f64>> {
    let values = input
        .split_whitespace()
        .map(|t| t.parse::<f64>())
        .collect::<std::result::Result<Vec<f64>, _>>()
        .map_err(|_| PhononError::InvalidArgument(format!("{} must be numbers, got '{}'", what, input)))?;
    if values.len() != expected {
        return Err(PhononError::InvalidArgument(format!(
            "{} needs {} values, got '{}'",
            what, expected, input
        )));
    }
    Ok(values)
}

// ─────────────────────────────────────────────────────────────
// 运行设置
// ─────────────────────────────────────────────────────────────

/// 前后处理共用的结构参数
#[derive(Debug, Clone)]
pub struct CellSettings {
    pub unitcell: PathBuf,
    pub displacement: f64,
    pub enlargement: Enlargement,
    pub periodicity: Periodicity,
    pub use_symmetry: bool,
}

impl CellSettings {
    fn resolve(args: &CellArgs, file: &ArgumentFile) -> Result<Self> {
        if let Some(code) = merge_text(None, file, "dft_code") {
            if !code.eq_ignore_ascii_case("vasp") {
                return Err(PhononError::InvalidArgument(format!(
                    "only the 'vasp' DFT code is supported, got '{}'",
                    code
                )));
            }
        }

        let unitcell = merge::<PathBuf>(args.unitcell.clone(), file, "unitcell")?
            .ok_or_else(|| PhononError::MissingArgument("--unitcell".to_string()))?;

        let displacement = merge(args.displacement, file, "displacement")?.unwrap_or(DEFAULT_DISPLACEMENT);
        if displacement <= 0.0 || !displacement.is_finite() {
            return Err(PhononError::InvalidArgument(format!(
                "displacement must be positive, got {}",
                displacement
            )));
        }

        let periodicity = Periodicity::parse(
            &merge_text(args.periodicity.as_deref(), file, "periodicity")
                .unwrap_or_else(|| DEFAULT_PERIODICITY.to_string()),
        )?;
        let enlargement = Enlargement::parse(
            &merge_text(args.enlargement.as_deref(), file, "enlargement")
                .unwrap_or_else(|| DEFAULT_ENLARGEMENT.to_string()),
        )?;
        enlargement.validate(&periodicity)?;

        let use_symmetry = !(args.no_sym || file.flag("no_sym")?);

        Ok(CellSettings {
            unitcell,
            displacement,
            enlargement,
            periodicity,
            use_symmetry,
        })
    }
}

/// 前处理设置
#[derive(Debug, Clone)]
pub struct PreSettings {
    pub cell: CellSettings,
    pub output_dir: PathBuf,
}

impl PreSettings {
    pub fn resolve(args: &PreArgs, file: &ArgumentFile) -> Result<Self> {
        Ok(PreSettings {
            cell: CellSettings::resolve(&args.cell, file)?,
            output_dir: args.output_dir.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct DosSettings {
    pub kpoints: Option<PathBuf>,
    pub sigma: f64,
    pub num_dos: usize,
}

#[derive(Debug, Clone)]
pub struct BandSettings {
    pub kpoints: PathBuf,
    /// 高对称点标签，按路径顺序
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ThermalSettings {
    pub tmin: f64,
    pub tmax: f64,
    pub tstep: f64,
}

#[derive(Debug, Clone)]
pub struct ModeSettings {
    pub bands: Vec<usize>,
    pub kpoint: [f64; 3],
}

/// 后处理设置
#[derive(Debug, Clone)]
pub struct PostSettings {
    pub cell: CellSettings,
    pub supercell: PathBuf,
    /// 力文件输入：文件、目录或 glob
    pub forces: Vec<String>,
    pub force_pattern: String,
    pub dos: Option<DosSettings>,
    pub thermal: Option<ThermalSettings>,
    pub band: Option<BandSettings>,
    pub mode: Option<ModeSettings>,
    pub plot: Option<PlotOptions>,
    pub solver: EigenSolver,
    pub jobs: usize,
    pub output_dir: PathBuf,
}

impl PostSettings {
    pub fn resolve(args: &PostArgs, file: &ArgumentFile) -> Result<Self> {
        let cell = CellSettings::resolve(&args.cell, file)?;
        let is_molecule = cell.periodicity.dimension() == 0;

        let supercell = merge::<PathBuf>(args.supercell.clone(), file, "supercell")?
            .ok_or_else(|| PhononError::MissingArgument("--supercell".to_string()))?;

        let forces = if !args.forces.is_empty() {
            args.forces.clone()
        } else {
            file.get("forces")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default()
        };
        if forces.is_empty() {
            return Err(PhononError::MissingArgument("--forces".to_string()));
        }
        let force_pattern = merge_text(args.force_pattern.as_deref(), file, "force_pattern")
            .unwrap_or_else(|| DEFAULT_FORCE_PATTERN.to_string());

        let want_dos = args.dos || file.flag("dos")?;
        let want_thermal = args.thermal || file.flag("thermal")?;
        let want_band = args.band || file.flag("band")?;
        let want_mode = args.mode || file.flag("mode")?;
        if !(want_dos || want_thermal || want_band || want_mode) {
            return Err(PhononError::MissingArgument(
                "at least one of --dos, --thermal, --band, --mode".to_string(),
            ));
        }

        // 热力学性质在 DOS 的 k 点网格上求和
        let dos = if want_dos || want_thermal {
            let kpoints = merge::<PathBuf>(args.kpoint_dos.clone(), file, "kpoint_dos")?;
            if kpoints.is_none() && !is_molecule {
                return Err(PhononError::MissingArgument("--kpoint-dos".to_string()));
            }
            let sigma = merge(args.sigma, file, "sigma")?.unwrap_or(DEFAULT_SIGMA);
            if sigma < 0.0 {
                return Err(PhononError::InvalidArgument(format!(
                    "sigma must be non-negative, got {}",
                    sigma
                )));
            }
            let num_dos = merge(args.num_dos, file, "number_dos")?.unwrap_or(DEFAULT_NUM_DOS);
            if num_dos == 0 {
                return Err(PhononError::InvalidArgument("number_dos must be positive".to_string()));
            }
            Some(DosSettings {
                kpoints,
                sigma,
                num_dos,
            })
        } else {
            None
        };

        let thermal = if want_thermal {
            let tmin = merge(args.tmin, file, "temperature_minimum")?.unwrap_or(0.0);
            let tmax = merge(args.tmax, file, "temperature_maximum")?.unwrap_or(1000.0);
            let tstep = merge(args.tstep, file, "temperature_step")?.unwrap_or(10.0);
            // 提前检查范围
            crate::analysis::thermal::temperature_range(tmin, tmax, tstep)?;
            Some(ThermalSettings { tmin, tmax, tstep })
        } else {
            None
        };

        let band = if want_band {
            if is_molecule {
                return Err(PhononError::InvalidArgument(
                    "phonon band needs at least one periodic direction".to_string(),
                ));
            }
            let kpoints = merge::<PathBuf>(args.kpoint_band.clone(), file, "kpoint_band")?
                .ok_or_else(|| PhononError::MissingArgument("--kpoint-band".to_string()))?;
            let labels = merge_text(args.kpoint_label_band.as_deref(), file, "kpoint_label_band")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            Some(BandSettings { kpoints, labels })
        } else {
            None
        };

        let mode = if want_mode {
            let bands = merge_text(args.mode_index.as_deref(), file, "index_mode")
                .unwrap_or_else(|| "0".to_string())
                .split_whitespace()
                .map(|t| {
                    t.parse::<usize>().map_err(|_| {
                        PhononError::InvalidArgument(format!("mode index must be a non-negative integer, got '{}'", t))
                    })
                })
                .collect::<Result<Vec<usize>>>()?;
            let k = parse_floats(
                &merge_text(args.mode_kpoint.as_deref(), file, "k_point_mode")
                    .unwrap_or_else(|| "0.0 0.0 0.0".to_string()),
                3,
                "mode k-point",
            )?;
            Some(ModeSettings {
                bands,
                kpoint: [k[0], k[1], k[2]],
            })
        } else {
            None
        };

        let plot = if args.plot || file.flag("plot")? {
            let limit = match merge_text(args.energy_limit.as_deref(), file, "energy_limit") {
                Some(raw) => {
                    let v = parse_floats(&raw, 2, "energy limit")?;
                    if v[0] >= v[1] {
                        return Err(PhononError::InvalidArgument(format!(
                            "energy limit needs min < max, got '{}'",
                            raw
                        )));
                    }
                    Some((v[0], v[1]))
                }
                None => None,
            };
            Some(PlotOptions {
                use_svg: args.svg || file.flag("svg")?,
                frequency_limit: limit,
                ..PlotOptions::default()
            })
        } else {
            None
        };

        let solver = if args.hermitian || file.flag("hermitian")? {
            EigenSolver::Hermitian
        } else {
            EigenSolver::General
        };
        let jobs = merge(args.jobs, file, "jobs")?.unwrap_or(0);

        Ok(PostSettings {
            cell,
            supercell,
            forces,
            force_pattern,
            dos,
            thermal,
            band,
            mode,
            plot,
            solver,
            jobs,
            output_dir: args.output_dir.clone(),
        })
    }
}
