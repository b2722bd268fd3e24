/// 文件名通配符. 支持 `*` (任意多个字符) 与 `?` (恰好一个字符), 区分大小写.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamePattern {
    pat: Vec<char>,
}

impl NamePattern {
    /// 由通配符串构建.
    pub fn new(pattern: &str) -> Self {
        Self {
            pat: pattern.chars().collect(),
        }
    }

    /// `name` 是否完整匹配.
    pub fn matches(&self, name: &str) -> bool {
        let name: Vec<char> = name.chars().collect();
        let pat = &self.pat;

        let (mut p, mut n) = (0, 0);
        // 最近一个 `*` 的位置, 以及它当时对应的名字位置.
        let mut star: Option<(usize, usize)> = None;
        while n < name.len() {
            match pat.get(p) {
                Some('*') => {
                    star = Some((p, n));
                    p += 1;
                }
                Some(&c) if c == '?' || c == name[n] => {
                    p += 1;
                    n += 1;
                }
                _ => match star {
                    Some((sp, sn)) => {
                        p = sp + 1;
                        n = sn + 1;
                        star = Some((sp, sn + 1));
                    }
                    None => return false,
                },
            }
        }
        pat[p..].iter().all(|&c| c == '*')
    }
}

impl std::fmt::Display for NamePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.pat.iter().try_for_each(|c| write!(f, "{c}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches() {
        let p = NamePattern::new("FM*.mod");
        assert!(p.matches("FM.mod"));
        assert!(p.matches("FM1.mod"));
        assert!(p.matches("FM_motor.v2.mod"));
        assert!(!p.matches("fm1.mod"));
        assert!(!p.matches("FM1.mod.bak"));
        assert!(!p.matches("XFM1.mod"));

        let p = NamePattern::new("*.rec");
        assert!(p.matches("a.rec"));
        assert!(p.matches(".rec"));
        assert!(!p.matches("a.rec~"));

        let p = NamePattern::new("t?_*_*.mrc");
        assert!(p.matches("t1_a_b.mrc"));
        assert!(!p.matches("t12_a_b.mrc"));
        assert!(p.matches("t1___.mrc"));

        assert!(NamePattern::new("*").matches(""));
        assert!(NamePattern::new("").matches(""));
        assert!(!NamePattern::new("").matches("a"));
        assert_eq!(NamePattern::new("FM*.mod").to_string(), "FM*.mod");
    }
}
