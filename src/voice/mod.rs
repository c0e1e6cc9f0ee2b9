//! Captura de voz para consultas habladas
//!
//! Graba audio del micrófono con cpal y lo vuelca a un WAV temporal que
//! luego se envía al servicio de transcripción. El callback de captura corre
//! en el hilo de audio del sistema, así que solo empuja búferes a una cola
//! acotada; todo el trabajo de archivo ocurre al detener la grabación.

pub mod transcribe;

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TrySendError};

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};

pub use transcribe::GroqTranscriber;

/// Canal único (mono)
pub const CANALES: u16 = 1;

/// Frecuencia de muestreo en Hz
pub const FRECUENCIA_MUESTREO: u32 = 44_100;

/// Muestras por búfer de captura
pub const TAMANO_BUFFER: u32 = 1024;

/// Búferes en vuelo entre el hilo de audio y el hilo que detiene
const CAPACIDAD_COLA: usize = 256;

/// Tamaño mínimo del WAV resultante en bytes
const MIN_BYTES_WAV: u64 = 1024;

/// Estado observable de la grabadora
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstadoGrabacion {
    Inactivo,
    Grabando,
    Procesando,
    Listo,
    Error,
}

/// Grabadora de micrófono respaldada por un WAV temporal
///
/// El `cpal::Stream` no es `Send`, por lo que la grabadora completa vive en
/// el hilo que la creó. Iniciar y detener son síncronos.
pub struct Grabadora {
    stream: Option<cpal::Stream>,
    rx: Option<Receiver<Vec<i16>>>,
    ruta_wav: PathBuf,
    estado: EstadoGrabacion,
}

impl Grabadora {
    /// Grabadora sobre la ruta WAV indicada
    pub fn new(ruta_wav: PathBuf) -> Self {
        Self {
            stream: None,
            rx: None,
            ruta_wav,
            estado: EstadoGrabacion::Inactivo,
        }
    }

    /// Grabadora sobre un WAV nuevo en el directorio temporal del sistema
    ///
    /// El nombre lleva marca de tiempo con nanosegundos para que dos
    /// sesiones simultáneas no compartan archivo.
    pub fn temporal() -> Self {
        let nombre = format!(
            "consulta_voz_{}.wav",
            chrono::Local::now().format("%Y%m%d_%H%M%S_%f")
        );
        Self::new(std::env::temp_dir().join(nombre))
    }

    pub fn estado(&self) -> EstadoGrabacion {
        self.estado
    }

    pub fn ruta_wav(&self) -> &Path {
        &self.ruta_wav
    }

    /// Abre el micrófono por defecto y comienza a capturar
    pub fn iniciar(&mut self) -> Result<()> {
        if self.estado == EstadoGrabacion::Grabando {
            bail!("Ya hay una grabación en curso.");
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No se encontró ningún micrófono disponible."))?;

        let config = StreamConfig {
            channels: CANALES,
            sample_rate: SampleRate(FRECUENCIA_MUESTREO),
            buffer_size: BufferSize::Fixed(TAMANO_BUFFER),
        };

        let (tx, rx) = mpsc::sync_channel::<Vec<i16>>(CAPACIDAD_COLA);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[i16], _| {
                    // hilo de audio: nunca bloquear; si la cola se llena se
                    // descarta el búfer
                    match tx.try_send(data.to_vec()) {
                        Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                        Err(TrySendError::Full(_)) => {
                            tracing::warn!("capture queue full, dropping buffer");
                        }
                    }
                },
                |e| tracing::warn!("audio stream error: {e}"),
                None,
            )
            .context("No se pudo abrir el flujo de entrada de audio")?;

        stream.play().context("No se pudo iniciar la captura")?;

        self.stream = Some(stream);
        self.rx = Some(rx);
        self.estado = EstadoGrabacion::Grabando;
        tracing::info!("recording started ({} Hz, mono)", FRECUENCIA_MUESTREO);
        Ok(())
    }

    /// Detiene la captura y escribe el WAV
    ///
    /// Cierra el flujo, drena la cola pendiente y vuelca todas las muestras.
    /// Una grabación sin muestras o con un archivo por debajo del mínimo se
    /// rechaza como demasiado corta.
    pub fn detener(&mut self) -> Result<PathBuf> {
        if self.estado != EstadoGrabacion::Grabando {
            bail!("No hay ninguna grabación en curso.");
        }
        self.estado = EstadoGrabacion::Procesando;

        // soltar el stream cierra el callback y desconecta el emisor
        drop(self.stream.take());
        let rx = self
            .rx
            .take()
            .ok_or_else(|| anyhow!("La cola de captura no está disponible."))?;

        let spec = hound::WavSpec {
            channels: CANALES,
            sample_rate: FRECUENCIA_MUESTREO,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(&self.ruta_wav, spec)
            .with_context(|| format!("No se pudo crear {}", self.ruta_wav.display()))?;

        let mut muestras = 0usize;
        while let Ok(frame) = rx.recv() {
            for sample in frame {
                writer.write_sample(sample)?;
                muestras += 1;
            }
        }
        writer.finalize().context("No se pudo cerrar el WAV")?;

        if muestras == 0 {
            self.estado = EstadoGrabacion::Error;
            self.limpiar_archivo();
            bail!("La grabación es demasiado corta. Intente de nuevo.");
        }

        let bytes = std::fs::metadata(&self.ruta_wav).map(|m| m.len()).unwrap_or(0);
        if bytes < MIN_BYTES_WAV {
            self.estado = EstadoGrabacion::Error;
            self.limpiar_archivo();
            bail!("La grabación es demasiado corta. Intente de nuevo.");
        }

        tracing::info!("recording saved: {} samples, {} bytes", muestras, bytes);
        self.estado = EstadoGrabacion::Listo;
        Ok(self.ruta_wav.clone())
    }

    /// Borra el WAV temporal y vuelve al estado inactivo
    ///
    /// Idempotente: llamarla sin archivo o repetidamente no falla.
    pub fn limpiar(&mut self) {
        drop(self.stream.take());
        self.rx = None;
        self.limpiar_archivo();
        self.estado = EstadoGrabacion::Inactivo;
    }

    fn limpiar_archivo(&self) {
        if self.ruta_wav.exists() {
            if let Err(e) = std::fs::remove_file(&self.ruta_wav) {
                tracing::warn!("could not remove {}: {e}", self.ruta_wav.display());
            }
        }
    }
}

impl Drop for Grabadora {
    fn drop(&mut self) {
        self.limpiar();
    }
}

/// Rechaza transcripciones sin contenido útil
///
/// El servicio devuelve a veces un punto suelto o una cadena vacía cuando el
/// audio no contenía voz.
pub fn validar_transcripcion(texto: &str) -> Result<String> {
    let texto = texto.trim();
    if texto.is_empty() || texto == "." || texto.chars().count() < 2 {
        bail!("No se detectó voz en la grabación. Intente de nuevo.");
    }
    Ok(texto.to_string())
}
