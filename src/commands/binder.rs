use super::dispatcher::DispatchContext;
use super::traits::{BoundArgs, CommandError, CommandSpec, ContextParam, ParamKind};

/// Map a message's tokens onto a command's declared parameters.
///
/// Tokens beyond the positional parameters go to the catch-all when one is
/// declared and are dropped otherwise.
pub fn bind(spec: &CommandSpec, ctx: &DispatchContext) -> Result<BoundArgs, CommandError> {
    let mut args = BoundArgs::default();

    for param in &spec.context {
        match param {
            ContextParam::Message => args.message = Some(ctx.message.clone()),
            ContextParam::Channel => args.channel = Some(ctx.message.channel.clone()),
            ContextParam::Author => args.author = Some(ctx.message.author.clone()),
            ContextParam::Server => args.server.clone_from(&ctx.message.server),
        }
    }

    bind_tokens(spec, &ctx.argument_tokens, &mut args)?;
    Ok(args)
}

/// Token half of [`bind`], independent of the inbound message.
pub fn bind_tokens(
    spec: &CommandSpec,
    tokens: &[String],
    args: &mut BoundArgs,
) -> Result<(), CommandError> {
    let mut remaining = tokens.iter();

    for param in spec.params.iter().filter(|p| p.is_positional()) {
        if let ParamKind::Optional {
            default: Some(default),
        } = param.kind
        {
            args.defaults.insert(param.name, default);
        }
        match remaining.next() {
            Some(token) => {
                args.positional.insert(param.name, token.clone());
            }
            None if matches!(param.kind, ParamKind::Required) => {
                return Err(CommandError::MissingArgument(param.name));
            }
            None => {}
        }
    }

    if spec.catch_all().is_some() {
        args.rest = Some(remaining.cloned().collect());
    }
    Ok(())
}
