//! 实验结果.

use crate::profile::Profile;
use std::io::{self, Write};

/// 将 `profile` 的结果写进 `w` 中.
fn describe_into<W: Write>(p: &Profile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.3}"),
            None => "/".to_string(),
        }
    }

    writeln!(w, "Batch size {}:", p.batch_size())?;
    writeln!(w, "{S4}Images: {}", p.images())?;
    writeln!(w, "{S4}Classified tiles: {}", p.tiles())?;
    writeln!(w, "{S4}Classifier calls: {}", p.batches())?;
    writeln!(w, "{S4}Grid generation time: {} us", p.grid_time_us())?;
    writeln!(
        w,
        "{S4}Average time per tile: {} us",
        f64_to_display(p.avg_tile_time_us())
    )?;
    writeln!(w, "{S4}Total machine time: {} us", p.real_time_us())?;
    let t = p.most_time_consuming().map(|d| d.as_micros().to_string());
    write!(
        w,
        "{S4}Slowest image costs {} us",
        t.as_deref().unwrap_or("/")
    )?;
    Ok(())
}

/// 消融实验最终结果.
pub struct AblationResult {
    profiles: Vec<Profile>,

    /// 每个批大小的标签网格是否都与第一个批大小完全一致.
    invariant: bool,
}

impl AblationResult {
    /// 初始化.
    pub fn new(profiles: Vec<Profile>, invariant: bool) -> Self {
        Self {
            profiles,
            invariant,
        }
    }

    /// 批大小不影响结果?
    #[inline]
    pub fn invariant(&self) -> bool {
        self.invariant
    }

    /// 分析运行结果.
    pub fn analyze(&self) -> io::Result<()> {
        utils::sep();
        let mut buf = Vec::with_capacity(512);

        for profile in self.profiles.iter() {
            describe_into(profile, &mut buf)?;
            println!("{}", String::from_utf8_lossy(&buf));
            buf.clear();

            utils::sep();
        }
        println!(
            "Batch size invariance: {}",
            if self.invariant { "held" } else { "VIOLATED" }
        );
        Ok(())
    }
}
