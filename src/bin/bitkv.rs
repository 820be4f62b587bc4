use bitkv::{DataFile, FileId, IoType, LogRecord, Options};
use clap::{crate_name, crate_version, crate_authors, command, Command, Arg, ArgMatches};
use failure::Error;
use tracing::Level;

fn main() -> Result<(), Error> {
    let matches = command!()
        .author(crate_authors!())
        .version(crate_version!())
        .name(crate_name!())
        .subcommand_required(true)
        .arg(
            Arg::new("dir")
            .long("dir")
            .takes_value(true)
            .help("directory holding the data files")
        )
        .arg(
            Arg::new("mmap")
            .long("mmap")
            .help("scan data files through a read-only memory map")
        )
        .arg(
            Arg::new("sync")
            .long("sync")
            .help("sync the data file after every append")
        )
        .arg(
            Arg::new("verbose")
            .short('v')
            .long("verbose")
            .help("print debug logs to stderr")
        )
        .subcommand(
            Command::new("put")
            .about("append a key-value record to a data file")
            .arg(fid_arg())
            .arg(
                Arg::new("key")
                .takes_value(true)
                .required(true)
                .help("key string")
            )
            .arg(
                Arg::new("value")
                .takes_value(true)
                .required(true)
                .help("value string")
            )
        )
        .subcommand(
            Command::new("del")
            .about("append a tombstone record to a data file")
            .arg(fid_arg())
            .arg(
                Arg::new("key")
                .takes_value(true)
                .required(true)
                .help("key string")
            )
        )
        .subcommand(
            Command::new("scan")
            .about("list every record of a data file")
            .arg(fid_arg())
        )
        .subcommand(
            Command::new("get")
            .about("read the record at an offset")
            .arg(fid_arg())
            .arg(
                Arg::new("offset")
                .takes_value(true)
                .required(true)
                .help("record offset")
            )
        )
        .get_matches();

    tracing_subscriber::fmt()
        .with_max_level(if matches.is_present("verbose") { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    let mut opts = Options::default();
    if let Some(dir) = matches.value_of("dir") {
        opts.dir_path = dir.into();
    }
    if matches.is_present("mmap") {
        opts.io_type = IoType::MMap;
    }
    opts.sync_writes = matches.is_present("sync");
    opts.check()?;

    match matches.subcommand() {
        Some(("put", sub_matches)) => {
            let key = sub_matches.value_of("key").unwrap();
            let value = sub_matches.value_of("value").unwrap();
            append(&opts, fid(sub_matches)?, &LogRecord::normal(key, value))?;
        }

        Some(("del", sub_matches)) => {
            let key = sub_matches.value_of("key").unwrap();
            append(&opts, fid(sub_matches)?, &LogRecord::deleted(key))?;
        }

        Some(("scan", sub_matches)) => {
            let df = DataFile::open(&opts.dir_path, fid(sub_matches)?, opts.io_type)?;
            let mut records = df.records();
            while let Some(item) = records.next() {
                let (offset, record, size) = item?;
                println!("{} {:?} {} {} {}", offset, record.rec_type,
                    String::from_utf8_lossy(&record.key),
                    String::from_utf8_lossy(&record.value),
                    size);
            }
            println!("end {}", records.offset());
        }

        Some(("get", sub_matches)) => {
            let df = DataFile::open(&opts.dir_path, fid(sub_matches)?, opts.io_type)?;
            let offset: u64 = sub_matches.value_of("offset").unwrap().parse()?;
            match df.read_log_record(offset) {
                Ok((record, size)) => {
                    println!("{:?} {} {} {}", record.rec_type,
                        String::from_utf8_lossy(&record.key),
                        String::from_utf8_lossy(&record.value),
                        size);
                }
                Err(err) if err.is_end_of_data() => {
                    println!("End of data");
                }
                Err(err) => return Err(err.into()),
            }
        }

        _ => { unreachable!("not a valid command"); }
    }

    Ok(())
}

fn fid_arg() -> Arg<'static> {
    Arg::new("fid")
        .takes_value(true)
        .required(true)
        .help("data file id")
}

fn fid(matches: &ArgMatches) -> Result<FileId, Error> {
    Ok(matches.value_of("fid").unwrap().parse()?)
}

/// Recovers the end of the data file, then appends through standard io.
fn append(opts: &Options, fid: FileId, record: &LogRecord) -> Result<(), Error> {
    let mut df = DataFile::open(&opts.dir_path, fid, opts.io_type)?;
    df.recover()?;
    if opts.io_type != IoType::StandardFio {
        df.set_io_type(IoType::StandardFio)?;
    }

    let pos = df.append_log_record(record)?;
    if opts.sync_writes {
        df.sync()?;
    }
    df.close()?;
    println!("{} {}", pos.offset, pos.size);
    Ok(())
}
