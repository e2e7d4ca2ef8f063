use anyhow::{Context, Result, bail, format_err};
use clap::{Arg, ArgAction, ArgMatches, Command};
use dialoguer::Confirm;
use indoc::indoc;
use log::Level;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use gptscan::{ChecksumOutcome, GptParser, GptScan, ParserSettings};

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

/// Exit status when the GPT decoded fine but a checksum did not match.
const EXIT_BAD_CHECKSUM: i32 = 2;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum GptOutputFormat {
    Text,
    Json,
}

struct GptDump {
    parser_settings: ParserSettings,
    input: PathBuf,
    output_format: GptOutputFormat,
    output: Box<dyn Write>,
    verbosity_level: Option<Level>,
    show_all_entries: bool,
    allow_bad_checksums: bool,
}

impl GptDump {
    pub fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let input = PathBuf::from(
            matches
                .get_one::<String>("INPUT")
                .expect("This is a required argument"),
        );

        let output_format = match matches
            .get_one::<String>("output-format")
            .map(String::as_str)
            .unwrap_or("text")
        {
            "json" => GptOutputFormat::Json,
            _ => GptOutputFormat::Text,
        };

        let block_size = *matches
            .get_one::<u64>("block-size")
            .expect("has default value");
        let max_array_bytes = *matches
            .get_one::<u64>("max-array-bytes")
            .expect("has default value");

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(Level::Info),
            2 => Some(Level::Debug),
            3 => Some(Level::Trace),
            _ => {
                eprintln!("using more than -vvv does not affect verbosity level");
                Some(Level::Trace)
            }
        };

        let output: Box<dyn Write> = match matches.get_one::<String>("output-target") {
            Some(path) => Box::new(Self::create_output_file(
                path,
                !matches.get_flag("no-confirm-overwrite"),
            )?),
            None => Box::new(io::stdout()),
        };

        Ok(GptDump {
            parser_settings: ParserSettings::new()
                .block_size(block_size)
                .max_partition_array_bytes(max_array_bytes),
            input,
            output_format,
            output,
            verbosity_level,
            show_all_entries: matches.get_flag("all-entries"),
            allow_bad_checksums: matches.get_flag("allow-bad-checksums"),
        })
    }

    /// Main entry point for `GptDump`. Returns whether both checksums matched.
    pub fn run(&mut self) -> Result<bool> {
        self.try_to_initialize_logging();

        let mut parser = GptParser::from_path(&self.input)
            .with_context(|| format!("Failed to open input `{}`", self.input.display()))?
            .with_configuration(self.parser_settings.clone());

        let scan = parser.parse().with_context(|| {
            format!("Failed to read the GPT of `{}`", self.input.display())
        })?;

        match self.output_format {
            GptOutputFormat::Text => self.dump_text(&scan)?,
            GptOutputFormat::Json => self.dump_json(&scan)?,
        }
        self.output.flush()?;

        Ok(scan.is_valid() || self.allow_bad_checksums)
    }

    /// If `prompt` is passed, will display a confirmation prompt before overwriting files.
    fn create_output_file(path: impl AsRef<Path>, prompt: bool) -> Result<File> {
        let p = path.as_ref();

        if p.is_dir() {
            bail!(
                "There is a directory at {}, refusing to overwrite",
                p.display()
            );
        }

        if p.exists() && prompt {
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "Are you sure you want to override output file at {}",
                    p.display()
                ))
                .default(false)
                .interact()
                .map_err(|e| {
                    format_err!("Failed to write confirmation prompt to term caused by\n{}", e)
                })?;

            if !confirmed {
                bail!("Cancelled");
            }
        }

        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory {}", parent.display())
                })?;
            }
        }

        File::create(p).with_context(|| format!("Failed to create output file {}", p.display()))
    }

    fn dump_json(&mut self, scan: &GptScan) -> Result<()> {
        let value = if self.show_all_entries {
            serde_json::to_value(scan)?
        } else {
            let mut value = serde_json::to_value(scan)?;
            value["entries"] = serde_json::to_value(scan.used_entries().collect::<Vec<_>>())?;
            value
        };

        serde_json::to_writer_pretty(&mut self.output, &value)?;
        writeln!(self.output)?;
        Ok(())
    }

    fn dump_text(&mut self, scan: &GptScan) -> Result<()> {
        let h = &scan.header;
        let out = &mut self.output;

        writeln!(out, "Primary GPT Header (block size {})", scan.block_size)?;
        writeln!(out, "  Signature                 '{}'", String::from_utf8_lossy(&h.signature))?;
        writeln!(
            out,
            "  Revision                  {} ({:#010x})",
            h.revision_string(),
            h.revision
        )?;
        writeln!(out, "  Header size               {}", h.header_size_bytes)?;
        writeln!(out, "  Header CRC32              {}", describe_checksum(&scan.header_crc))?;
        writeln!(out, "  Current LBA               {}", h.lba_of_current)?;
        writeln!(out, "  Backup LBA                {}", h.lba_of_backup)?;
        writeln!(out, "  First usable LBA          {}", h.first_usable_lba)?;
        writeln!(out, "  Last usable LBA           {}", h.last_usable_lba)?;
        writeln!(out, "  Disk GUID                 {}", h.disk_guid)?;
        writeln!(out, "  Partition entries LBA     {}", h.lba_start_of_part_entries)?;
        writeln!(out, "  Number of entries         {}", h.num_part_entries)?;
        writeln!(out, "  Entry size                {}", h.single_part_entry_size)?;
        writeln!(out, "  Partition array CRC32     {}", describe_checksum(&scan.part_array_crc))?;
        if let Some(reason) = &scan.entries_skipped {
            writeln!(out, "  Entries not decoded       {}", reason)?;
        }

        let entries: Vec<_> = if self.show_all_entries {
            scan.entries.iter().collect()
        } else {
            scan.used_entries().collect()
        };

        if entries.is_empty() {
            return Ok(());
        }

        writeln!(out)?;
        writeln!(
            out,
            "{:>4}  {:>12}  {:>12}  {:<36}  {:<36}  {:>18}  Name",
            "#", "First LBA", "Last LBA", "Type GUID", "Unique GUID", "Attributes"
        )?;
        for entry in entries {
            writeln!(
                out,
                "{:>4}  {:>12}  {:>12}  {:<36}  {:<36}  {:#018x}  {}",
                entry.number,
                entry.first_lba,
                entry.last_lba,
                entry.part_type_guid.to_string(),
                entry.unique_uuid.to_string(),
                entry.attr_flags,
                entry.name_lossy()
            )?;
        }

        Ok(())
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            if let Err(e) = TermLogger::init(
                level.to_level_filter(),
                Config::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            ) {
                eprintln!("Failed to initialize logging: {}", e);
            }
        }
    }
}

fn describe_checksum(outcome: &ChecksumOutcome) -> String {
    if outcome.is_valid() {
        format!("{:#010x} (valid)", outcome.expected())
    } else {
        format!(
            "{:#010x} (INVALID, computed {:#010x})",
            outcome.expected(), outcome.computed()
        )
    }
}

fn command() -> Command {
    Command::new("gpt_dump")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Utility to inspect and validate GPT partitioned images")
        .long_about(indoc!(r#"
            Utility to inspect and validate GPT partitioned images.

            Reads the primary GPT header at LBA 1, checks its structure, and verifies
            both the header CRC32 and the partition entry array CRC32.

            Exit status is 0 when everything checks out, 1 when the header cannot be
            read or is malformed, and 2 when a checksum does not match.
        "#))
        .arg(Arg::new("INPUT").required(true).help("Disk image or block device to read."))
        .arg(
            Arg::new("block-size")
                .short('b')
                .long("block-size")
                .value_parser(clap::value_parser!(u64))
                .default_value("512")
                .help("Logical block size of the input, in bytes (usually 512 or 4096)."),
        )
        .arg(
            Arg::new("max-array-bytes")
                .long("max-array-bytes")
                .value_parser(clap::value_parser!(u64))
                .default_value("16777216")
                .help("Refuse to read partition entry arrays larger than this many bytes."),
        )
        .arg(
            Arg::new("output-format")
                .short('o')
                .long("format")
                .value_parser(["text", "json"])
                .default_value("text")
                .help("Sets the output format"),
        )
        .arg(
            Arg::new("output-target")
                .long("output")
                .short('f')
                .action(ArgAction::Set)
                .help(indoc!("
                    Writes output to the file specified instead of stdout, errors will still be printed to stderr.
                    Will ask for confirmation before overwriting files, to allow overwriting, pass `--no-confirm-overwrite`
                    Will create parent directories if needed.")),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        )
        .arg(
            Arg::new("all-entries")
                .long("all-entries")
                .action(ArgAction::SetTrue)
                .help("Also print unused (all-zero type GUID) partition entries."),
        )
        .arg(
            Arg::new("allow-bad-checksums")
                .long("allow-bad-checksums")
                .action(ArgAction::SetTrue)
                .help("Exit successfully even if a checksum does not match."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("-v - info, -vv - debug, -vvv - trace"),
        )
}

fn main() {
    let matches = command().get_matches();

    let result = GptDump::from_cli_matches(&matches).and_then(|mut app| app.run());

    match result {
        Ok(true) => {}
        Ok(false) => exit(EXIT_BAD_CHECKSUM),
        Err(e) => {
            eprintln!("{:?}", e);
            exit(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        command().debug_assert();
    }

    #[test]
    fn test_describe_checksum() {
        assert_eq!(
            describe_checksum(&ChecksumOutcome::new(0xCBF4_3926, 0xCBF4_3926)),
            "0xcbf43926 (valid)"
        );
        assert_eq!(
            describe_checksum(&ChecksumOutcome::new(1, 2)),
            "0x00000001 (INVALID, computed 0x00000002)"
        );
    }
}
