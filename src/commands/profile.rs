use crate::cli::ProfileArgs;
use crate::strprof::{
    align::AlignerParams,
    locus::{stream_loci_into_channel, Locus},
    reads::FilterParams,
    workflows::{analyze_locus, LocusResult, Params},
    writers::BamWriter,
};
use crate::utils::{create_writer, get_bam_header, is_bam_mapped, Result};
use crossbeam_channel::{bounded, Sender};
use rayon::{
    iter::{ParallelBridge, ParallelIterator},
    ThreadPoolBuilder,
};
use rust_htslib::bam;
use std::{cell::RefCell, path::PathBuf, sync::Arc, thread};

#[derive(Debug, Clone)]
struct ThreadContextParams {
    reads_path: PathBuf,
}

thread_local! {
    static CTX_PARAMS: RefCell<Option<ThreadContextParams>> = const { RefCell::new(None) };
    // Opened on the first locus a worker sees
    static THREAD_BAM_READER: RefCell<Option<bam::IndexedReader>> = const { RefCell::new(None) };
}

const CHANNEL_BUFFER_SIZE: usize = 2048;

pub fn profile(args: ProfileArgs) -> Result<()> {
    if args.min_flank > args.flank_len {
        return Err(format!(
            "Minimum flank ({}) cannot exceed the fetched flank length ({})",
            args.min_flank, args.flank_len
        ));
    }

    let bam_header = get_bam_header(&args.reads_path)?;
    if !is_bam_mapped(&bam_header) {
        return Err("Input BAM is not mapped".into());
    }

    let mut bam_writer = create_writer(&args.output_prefix, "profiled.bam", |path| {
        BamWriter::new(path, bam_header)
    })?;

    let (sender_locus, receiver_locus) = bounded(CHANNEL_BUFFER_SIZE);
    let repeats_path = args.repeats_path.clone();
    let genome_path = args.genome_path.clone();
    let flank_len = args.flank_len;
    let locus_stream_thread = thread::spawn(move || {
        stream_loci_into_channel(&repeats_path, &genome_path, flank_len, sender_locus)
    });

    let (sender_result, receiver_result) = bounded::<(Locus, LocusResult)>(CHANNEL_BUFFER_SIZE);
    let writer_thread = thread::spawn(move || {
        let (mut num_loci, mut num_reads) = (0usize, 0usize);
        for (locus, results) in &receiver_result {
            if let Err(e) = bam_writer.write(&locus, &results) {
                log::error!("Failed to write reads of locus {}: {}", locus.id, e);
                continue;
            }
            num_loci += 1;
            num_reads += results.reads.len();
        }
        log::info!("Wrote {} reads across {} loci", num_reads, num_loci);
    });

    let workflow_params = Arc::new(Params {
        aligner: AlignerParams::default(),
        filters: FilterParams {
            min_bp_before_indel: args.min_bp_before_indel as i64,
            min_read_end_match: args.min_read_end_match as i64,
            maximal_end_match_window: args.maximal_end_match,
            max_mapq: args.max_mapq,
            filter_clipped: args.filter_clipped,
            require_unit: args.unit,
        },
        min_flank: args.min_flank,
        max_depth: args.max_depth,
        remove_duplicates: !args.no_rmdup,
    });

    log::debug!(
        "Initializing thread pool with {} threads...",
        args.num_threads
    );

    let pool = initialize_thread_pool(
        args.num_threads,
        ThreadContextParams {
            reads_path: args.reads_path.clone(),
        },
    )?;
    pool.install(|| {
        receiver_locus
            .into_iter()
            .par_bridge()
            .for_each_with(&sender_result, |s, locus_result| match locus_result {
                Ok(locus) => process_locus(locus, &workflow_params, s),
                Err(err) => log::error!("Locus processing: {:#}", err),
            });
    });

    drop(sender_result);
    writer_thread
        .join()
        .map_err(|_| "Writer thread panicked".to_string())?;
    log::trace!("Writer thread finished");
    match locus_stream_thread
        .join()
        .map_err(|_| "Locus stream thread panicked".to_string())?
    {
        Ok(_) => log::trace!("Locus stream thread finished"),
        Err(e) => log::error!("Locus streaming failed: {}", e),
    }

    Ok(())
}

fn open_thread_bam_reader() -> Result<bam::IndexedReader> {
    let path = CTX_PARAMS
        .with(|ctx_cell| ctx_cell.borrow().as_ref().map(|ctx| ctx.reads_path.clone()))
        .ok_or("Thread context parameters not initialized for BAM path")?;
    bam::IndexedReader::from_path(&path).map_err(|e| {
        format!(
            "Failed to initialize BAM reader for path {}: {}",
            path.display(),
            e
        )
    })
}

fn analyze_with_thread_reader(locus: &Locus, workflow_params: &Params) -> Result<LocusResult> {
    THREAD_BAM_READER.with(|reader_cell| {
        let mut slot = reader_cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(open_thread_bam_reader()?);
        }
        let reader = slot.as_mut().ok_or("BAM reader unavailable")?;
        analyze_locus(locus, workflow_params, reader)
    })
}

fn process_locus(
    locus: Locus,
    workflow_params: &Arc<Params>,
    sender_result: &Sender<(Locus, LocusResult)>,
) {
    match analyze_with_thread_reader(&locus, workflow_params) {
        Ok(results) => {
            log::debug!(
                "{}: kept {} reads, filtered {}, removed {} duplicates",
                locus.id,
                results.reads.len(),
                results.num_filtered(),
                results.num_duplicates
            );
            if let Err(e) = sender_result.send((locus, results)) {
                log::error!("Failed to send locus result to writer thread: {}", e);
            }
        }
        Err(err) => {
            log::error!("Error analyzing locus {}: {}", locus.id, err);
        }
    }
}

fn initialize_thread_pool(
    num_threads: usize,
    thread_context: ThreadContextParams,
) -> Result<rayon::ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("strprof-{}", i))
        .start_handler(move |_thread_index| {
            CTX_PARAMS.with(|cell| {
                *cell.borrow_mut() = Some(thread_context.clone());
            });
            log::trace!("Initialized thread {:?}", std::thread::current().id());
        })
        .exit_handler(|_thread_index| {
            CTX_PARAMS.with(|cell| {
                *cell.borrow_mut() = None;
            });
            THREAD_BAM_READER.with(|cell| {
                *cell.borrow_mut() = None;
            });
        })
        .build()
        .map_err(|e| format!("Failed to initialize thread pool: {}", e))
}
