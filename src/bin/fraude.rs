//! Predictor de fraude en transacciones (binario independiente)

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use sentencias_rag::fraud::{FraudPredictor, TipoTransaccion, Transaccion};

#[derive(Parser)]
#[command(name = "fraude")]
#[command(version, about = "Clasifica una transacción como fraude o legítima", long_about = None)]
struct Args {
    /// Paso temporal de la transacción (horas desde el inicio del dataset)
    #[arg(long)]
    step: u32,

    /// Tipo: CASH_OUT, PAYMENT, CASH_IN, TRANSFER o DEBIT
    #[arg(long)]
    tipo: TipoTransaccion,

    /// Monto de la transacción
    #[arg(long)]
    monto: f64,

    /// Saldo previo de la cuenta de origen
    #[arg(long)]
    saldo_origen: f64,

    /// Saldo previo de la cuenta de destino
    #[arg(long)]
    saldo_destino: f64,

    /// La transacción ya venía marcada por el sistema bancario
    #[arg(long)]
    marcada_fraude: bool,

    /// Ruta del escalador exportado
    #[arg(long, default_value = "artefactos/escalador.json")]
    escalador: PathBuf,

    /// Ruta del modelo exportado
    #[arg(long, default_value = "artefactos/modelo.json")]
    modelo: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();

    let predictor = FraudPredictor::load(&args.escalador, &args.modelo)?;

    let transaccion = Transaccion {
        step: args.step,
        tipo: args.tipo,
        monto: args.monto,
        saldo_origen: args.saldo_origen,
        saldo_destino: args.saldo_destino,
        marcada_fraude: args.marcada_fraude,
    };

    match predictor.predecir(&transaccion) {
        1 => println!("¡Esta transacción se predice como Fraude!"),
        _ => println!("Esta transacción se predice como No Fraudulenta."),
    }

    Ok(())
}
