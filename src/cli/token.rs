use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::{load_library, OutputFormat};
use crate::core::address::{AddressCodec, AddressConfig, AddressError, TilePosition, TileVariantId};
use crate::core::token::{format_position, Call, Token};

#[derive(Args)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommands,

    /// Take address widths from this library instead of the defaults
    #[arg(long, global = true)]
    pub library: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Show the fields and integer forms of a compact token
    Decode {
        /// Token such as 2c5.00.001a.003+2, or a no-call such as 2c5.00.001a.-
        #[arg(required = true)]
        token: String,
    },

    /// Build a compact token from its fields (hex)
    Encode {
        #[arg(long, required = true, value_parser = parse_hex)]
        path: u32,

        #[arg(long, default_value = "0", value_parser = parse_hex)]
        version: u32,

        #[arg(long, required = true, value_parser = parse_hex)]
        step: u32,

        #[arg(long, default_value = "0", value_parser = parse_hex)]
        variant: u32,

        /// Number of positions spanned
        #[arg(long, default_value = "1", value_parser = parse_hex)]
        span: u32,
    },

    /// Decode the integer form of a tile variant (or position)
    Unpack {
        /// Integer, decimal or 0x-prefixed hex
        #[arg(required = true, value_parser = parse_integer)]
        value: u64,

        /// The integer is a position rather than a tile variant
        #[arg(long)]
        position: bool,
    },
}

fn parse_hex(s: &str) -> Result<u32, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u32::from_str_radix(digits, 16).map_err(|e| format!("'{s}' is not a hex number: {e}"))
}

fn parse_integer(s: &str) -> Result<u64, String> {
    match s.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|e| format!("'{s}' is not an integer: {e}"))
}

#[derive(Serialize)]
struct DecodedToken {
    token: String,
    path: u32,
    version: u32,
    step: u32,
    /// Absent for no-calls and bare positions
    variant: Option<u32>,
    span: u32,
    position_integer: u64,
    variant_integer: Option<u64>,
}

impl DecodedToken {
    fn new(call: &Call, codec: &AddressCodec) -> Result<Self, AddressError> {
        let position = call.position();
        let (variant, span, variant_integer) = match call {
            Call::Tile(token) => (
                Some(token.variant.value),
                token.span,
                Some(codec.encode_variant(token.variant)?),
            ),
            Call::NotWellSequenced(_) => (None, 1, None),
        };
        Ok(Self {
            token: call.to_compact(codec.config()),
            path: position.path,
            version: position.version,
            step: position.step,
            variant,
            span,
            position_integer: codec.encode_position(position)?,
            variant_integer,
        })
    }

    fn for_position(position: TilePosition, codec: &AddressCodec) -> Result<Self, AddressError> {
        Ok(Self {
            token: format_position(position, codec.config()),
            path: position.path,
            version: position.version,
            step: position.step,
            variant: None,
            span: 1,
            position_integer: codec.encode_position(position)?,
            variant_integer: None,
        })
    }
}

/// Execute token subcommand
///
/// # Errors
///
/// Returns an error if the token or integer is malformed or a field overflows
/// its width.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: TokenArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let address = match &args.library {
        Some(path) => load_library(path, verbose)?.config().address,
        None => AddressConfig::default(),
    };
    let codec = AddressCodec::new(address)?;

    let decoded = match args.command {
        TokenCommands::Decode { token } => DecodedToken::new(&Call::parse(&token, &address)?, &codec)?,
        TokenCommands::Encode {
            path,
            version,
            step,
            variant,
            span,
        } => {
            let id = TileVariantId::new(TilePosition::new(version, path, step), variant);
            DecodedToken::new(&Call::Tile(Token::new(id, span)), &codec)?
        }
        TokenCommands::Unpack { value, position } => {
            if position {
                DecodedToken::for_position(codec.decode_position(value)?, &codec)?
            } else {
                let id = codec.decode_variant(value)?;
                DecodedToken::new(&Call::Tile(Token::new(id, 1)), &codec)?
            }
        }
    };

    match format {
        OutputFormat::Text => {
            println!("Token:    {}", decoded.token);
            println!("Path:     {:#x}", decoded.path);
            println!("Version:  {:#x}", decoded.version);
            println!("Step:     {:#x}", decoded.step);
            match decoded.variant {
                Some(variant) => println!("Variant:  {variant:#x}"),
                None => println!("Variant:  -"),
            }
            println!("Span:     {}", decoded.span);
            println!("Position: {}", decoded.position_integer);
            if let Some(integer) = decoded.variant_integer {
                println!("Integer:  {integer}");
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&decoded)?);
        }
        OutputFormat::Tsv => {
            println!("token\tpath\tversion\tstep\tvariant\tspan\tposition_integer\tvariant_integer");
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                decoded.token,
                decoded.path,
                decoded.version,
                decoded.step,
                decoded.variant.map_or_else(|| "-".to_string(), |v| v.to_string()),
                decoded.span,
                decoded.position_integer,
                decoded
                    .variant_integer
                    .map_or_else(|| "-".to_string(), |v| v.to_string()),
            );
        }
    }
    Ok(())
}
