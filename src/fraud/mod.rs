//! Predictor de fraude en transacciones financieras
//!
//! Aplicación hermana e independiente del corpus de sentencias: una
//! regresión logística ya entrenada cuyos coeficientes y escalador se
//! cargan desde artefactos JSON. Aquí no hay entrenamiento, solo
//! inferencia.

use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Número de características del modelo
pub const NUM_CARACTERISTICAS: usize = 6;

/// Tipo de transacción con su código de entrenamiento
///
/// Los códigos provienen del conjunto de datos original y no pueden
/// cambiarse sin reentrenar el modelo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipoTransaccion {
    CashOut,
    Payment,
    CashIn,
    Transfer,
    Debit,
}

impl TipoTransaccion {
    /// Código numérico usado como característica
    pub fn codigo(self) -> f64 {
        match self {
            TipoTransaccion::CashOut => 5.0,
            TipoTransaccion::Payment => 4.0,
            TipoTransaccion::CashIn => 3.0,
            TipoTransaccion::Transfer => 2.0,
            TipoTransaccion::Debit => 1.0,
        }
    }
}

impl FromStr for TipoTransaccion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CASH_OUT" => Ok(TipoTransaccion::CashOut),
            "PAYMENT" => Ok(TipoTransaccion::Payment),
            "CASH_IN" => Ok(TipoTransaccion::CashIn),
            "TRANSFER" => Ok(TipoTransaccion::Transfer),
            "DEBIT" => Ok(TipoTransaccion::Debit),
            otro => bail!(
                "Tipo de transacción desconocido: {otro}. \
                 Use CASH_OUT, PAYMENT, CASH_IN, TRANSFER o DEBIT."
            ),
        }
    }
}

/// Transacción a evaluar
#[derive(Debug, Clone)]
pub struct Transaccion {
    pub step: u32,
    pub tipo: TipoTransaccion,
    pub monto: f64,
    pub saldo_origen: f64,
    pub saldo_destino: f64,
    pub marcada_fraude: bool,
}

impl Transaccion {
    /// Vector de características en el orden del entrenamiento
    fn caracteristicas(&self) -> [f64; NUM_CARACTERISTICAS] {
        [
            self.step as f64,
            self.tipo.codigo(),
            self.monto,
            self.saldo_origen,
            self.saldo_destino,
            if self.marcada_fraude { 1.0 } else { 0.0 },
        ]
    }
}

/// Escalador estándar exportado del entrenamiento
#[derive(Debug, Deserialize)]
struct Escalador {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

/// Coeficientes de la regresión logística
#[derive(Debug, Deserialize)]
struct Modelo {
    coef: Vec<f64>,
    intercept: f64,
}

/// Regresión logística de inferencia sobre artefactos JSON
pub struct FraudPredictor {
    escalador: Escalador,
    modelo: Modelo,
}

impl FraudPredictor {
    /// Carga escalador y modelo, verificando sus dimensiones
    pub fn load(ruta_escalador: &Path, ruta_modelo: &Path) -> Result<Self> {
        let escalador: Escalador = leer_json(ruta_escalador)?;
        let modelo: Modelo = leer_json(ruta_modelo)?;

        if escalador.mean.len() != NUM_CARACTERISTICAS
            || escalador.scale.len() != NUM_CARACTERISTICAS
        {
            bail!(
                "El escalador en {} no tiene {NUM_CARACTERISTICAS} dimensiones",
                ruta_escalador.display()
            );
        }
        if modelo.coef.len() != NUM_CARACTERISTICAS {
            bail!(
                "El modelo en {} no tiene {NUM_CARACTERISTICAS} coeficientes",
                ruta_modelo.display()
            );
        }
        if escalador.scale.iter().any(|s| *s == 0.0) {
            bail!("El escalador contiene una escala cero");
        }

        Ok(Self { escalador, modelo })
    }

    /// Clasifica la transacción: 1 = fraude, 0 = legítima
    pub fn predecir(&self, transaccion: &Transaccion) -> u8 {
        let caracteristicas = transaccion.caracteristicas();

        let mut z = self.modelo.intercept;
        for i in 0..NUM_CARACTERISTICAS {
            let escalada =
                (caracteristicas[i] - self.escalador.mean[i]) / self.escalador.scale[i];
            z += self.modelo.coef[i] * escalada;
        }

        // frontera de decisión de la logística: sigmoide(z) > 0.5 <=> z > 0
        u8::from(z > 0.0)
    }
}

fn leer_json<T: serde::de::DeserializeOwned>(ruta: &Path) -> Result<T> {
    let contenido = std::fs::read_to_string(ruta)
        .with_context(|| format!("No se pudo leer {}", ruta.display()))?;
    serde_json::from_str(&contenido)
        .with_context(|| format!("JSON inválido en {}", ruta.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn escribir_artefactos(dir: &Path, coef: [f64; 6], intercept: f64) -> (PathBuf, PathBuf) {
        let escalador = dir.join("escalador.json");
        let modelo = dir.join("modelo.json");
        std::fs::write(
            &escalador,
            serde_json::json!({
                "mean": [100.0, 3.0, 50_000.0, 80_000.0, 60_000.0, 0.0],
                "scale": [50.0, 1.5, 100_000.0, 200_000.0, 150_000.0, 1.0],
            })
            .to_string(),
        )
        .unwrap();
        std::fs::write(
            &modelo,
            serde_json::json!({ "coef": coef, "intercept": intercept }).to_string(),
        )
        .unwrap();
        (escalador, modelo)
    }

    fn transaccion_base() -> Transaccion {
        Transaccion {
            step: 120,
            tipo: TipoTransaccion::Transfer,
            monto: 250_000.0,
            saldo_origen: 250_000.0,
            saldo_destino: 0.0,
            marcada_fraude: false,
        }
    }

    #[test]
    fn test_tipo_codes_match_training() {
        assert_eq!(TipoTransaccion::CashOut.codigo(), 5.0);
        assert_eq!(TipoTransaccion::Payment.codigo(), 4.0);
        assert_eq!(TipoTransaccion::CashIn.codigo(), 3.0);
        assert_eq!(TipoTransaccion::Transfer.codigo(), 2.0);
        assert_eq!(TipoTransaccion::Debit.codigo(), 1.0);
    }

    #[test]
    fn test_tipo_from_str_is_case_insensitive() {
        assert_eq!(
            "cash_out".parse::<TipoTransaccion>().unwrap(),
            TipoTransaccion::CashOut
        );
        assert!("REGALO".parse::<TipoTransaccion>().is_err());
    }

    #[test]
    fn test_prediction_is_deterministic_and_binary() {
        let dir = TempDir::new().unwrap();
        let (escalador, modelo) =
            escribir_artefactos(dir.path(), [0.1, 0.2, 0.9, -0.3, -0.2, 0.5], -0.1);
        let predictor = FraudPredictor::load(&escalador, &modelo).unwrap();

        let t = transaccion_base();
        let a = predictor.predecir(&t);
        let b = predictor.predecir(&t);
        assert_eq!(a, b);
        assert!(a == 0 || a == 1);
    }

    #[test]
    fn test_strong_positive_weights_flag_large_transfer() {
        let dir = TempDir::new().unwrap();
        let (escalador, modelo) =
            escribir_artefactos(dir.path(), [0.0, 0.0, 10.0, 0.0, 0.0, 0.0], 0.0);
        let predictor = FraudPredictor::load(&escalador, &modelo).unwrap();

        let mut t = transaccion_base();
        t.monto = 1_000_000.0;
        assert_eq!(predictor.predecir(&t), 1);

        t.monto = 100.0;
        assert_eq!(predictor.predecir(&t), 0);
    }

    #[test]
    fn test_shipped_artifacts_classify_scenarios() {
        let base = Path::new(env!("CARGO_MANIFEST_DIR")).join("artefactos");
        let predictor =
            FraudPredictor::load(&base.join("escalador.json"), &base.join("modelo.json"))
                .unwrap();

        // transferencia que vacía la cuenta de origen hacia una cuenta vacía
        let sospechosa = Transaccion {
            step: 300,
            tipo: TipoTransaccion::Transfer,
            monto: 10_000_000.0,
            saldo_origen: 10_000_000.0,
            saldo_destino: 0.0,
            marcada_fraude: false,
        };
        assert_eq!(predictor.predecir(&sospechosa), 1);

        // pago pequeño y cotidiano
        let cotidiana = Transaccion {
            step: 50,
            tipo: TipoTransaccion::Payment,
            monto: 5_000.0,
            saldo_origen: 20_000.0,
            saldo_destino: 100_000.0,
            marcada_fraude: false,
        };
        assert_eq!(predictor.predecir(&cotidiana), 0);
    }

    #[test]
    fn test_load_rejects_wrong_dimensions() {
        let dir = TempDir::new().unwrap();
        let escalador = dir.path().join("escalador.json");
        let modelo = dir.path().join("modelo.json");
        std::fs::write(
            &escalador,
            serde_json::json!({ "mean": [0.0, 0.0], "scale": [1.0, 1.0] }).to_string(),
        )
        .unwrap();
        std::fs::write(
            &modelo,
            serde_json::json!({ "coef": [0.0, 0.0, 0.0, 0.0, 0.0, 0.0], "intercept": 0.0 }).to_string(),
        )
        .unwrap();

        assert!(FraudPredictor::load(&escalador, &modelo).is_err());
    }

    #[test]
    fn test_load_rejects_zero_scale() {
        let dir = TempDir::new().unwrap();
        let escalador = dir.path().join("escalador.json");
        let modelo = dir.path().join("modelo.json");
        std::fs::write(
            &escalador,
            serde_json::json!({ "mean": [0.0, 0.0, 0.0, 0.0, 0.0, 0.0], "scale": [1.0, 1.0, 0.0, 1.0, 1.0, 1.0] })
                .to_string(),
        )
        .unwrap();
        std::fs::write(
            &modelo,
            serde_json::json!({ "coef": [0.0, 0.0, 0.0, 0.0, 0.0, 0.0], "intercept": 0.0 }).to_string(),
        )
        .unwrap();

        assert!(FraudPredictor::load(&escalador, &modelo).is_err());
    }
}
