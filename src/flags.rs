use clap::Args;
use std::error::Error;

#[derive(Args, Debug)]
pub struct ExplainFlagsArgs {
    /// SAM flag values to decode, as decimal integers
    #[arg(required = true)]
    pub flags: Vec<u32>,
}

/// SAM v1.6 FLAG bits, lowest first.
pub const SAM_FLAGS: [(&str, u32); 12] = [
    ("read paired", 0x1),
    ("read mapped in proper pair", 0x2),
    ("read unmapped", 0x4),
    ("mate unmapped", 0x8),
    ("read reverse strand", 0x10),
    ("mate reverse strand", 0x20),
    ("first in pair", 0x40),
    ("second in pair", 0x80),
    ("not primary alignment", 0x100),
    ("read fails platform/vendor quality checks", 0x200),
    ("read is PCR or optical duplicate", 0x400),
    ("supplementary alignment", 0x800),
];

/// Names of all flag bits set in `flags`, in table order. Bits beyond
/// the table are ignored.
pub fn explain(flags: u32) -> Vec<&'static str> {
    SAM_FLAGS
        .iter()
        .filter(|(_, bit)| (flags & bit) != 0)
        .map(|(name, _)| *name)
        .collect()
}

pub fn run(args: &ExplainFlagsArgs) -> Result<(), Box<dyn Error>> {
    for &flags in &args.flags {
        println!("{}:", flags);
        for name in explain(flags) {
            println!("    {}", name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explain_zero_is_empty() {
        assert!(explain(0).is_empty());
    }

    #[test]
    fn test_explain_combined_flags() {
        assert_eq!(explain(0x5), vec!["read paired", "read unmapped"]);
        assert_eq!(
            explain(0x63),
            vec![
                "read paired",
                "read mapped in proper pair",
                "mate reverse strand",
                "first in pair",
            ]
        );
    }

    #[test]
    fn test_explain_single_bit() {
        assert_eq!(explain(0x800), vec!["supplementary alignment"]);
        assert_eq!(explain(0x400), vec!["read is PCR or optical duplicate"]);
    }

    #[test]
    fn test_explain_all_bits_in_table_order() {
        let names = explain(0xFFF);
        assert_eq!(names.len(), 12);
        assert_eq!(names[0], "read paired");
        assert_eq!(names[11], "supplementary alignment");
        let expected: Vec<&str> = SAM_FLAGS.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_explain_ignores_bits_beyond_table() {
        assert!(explain(0x1000).is_empty());
        assert_eq!(explain(0x1001), vec!["read paired"]);
    }
}
