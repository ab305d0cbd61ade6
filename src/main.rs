use anyhow::{Context, Result};
use object_transfer::{
    Object, ObjectExtra, StorageClient,
    config::{ClientConfig, Command},
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // --- Parse config + command ---
    let (cfg, command) = ClientConfig::from_env_and_args()?;
    tracing::debug!(
        "endpoint {} chunk_size {} digest {} verify_hash {}",
        cfg.endpoint,
        cfg.chunk_size,
        cfg.digest,
        cfg.verify_hash
    );

    let client = StorageClient::new(cfg).context("building HTTP client")?;

    match command {
        Command::Upload {
            container,
            file,
            name,
            content_type,
            meta,
        } => {
            let name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .with_context(|| format!("cannot derive object name from {}", file.display()))?,
            };
            let mut extra = ObjectExtra::default();
            extra.content_type = content_type;
            extra.meta_data.extend(meta);

            let obj = client
                .multipart_upload_object(&file, &container, &name, extra)
                .await?;
            print_json(&obj)?;
        }
        Command::Download {
            container,
            object,
            destination,
            overwrite,
            keep_partial,
        } => {
            let obj = client.get_object(&container, &object).await?;
            let result = client
                .download_object(&obj, &destination, overwrite, !keep_partial)
                .await?;
            print_json(&result)?;
        }
        Command::List { container } => {
            let mut cursor = client.list_container_objects(&container)?;
            while let Some(obj) = cursor.next().await? {
                println!("{}\t{}\t{}", obj.size, obj.hash.as_deref().unwrap_or("-"), obj.name);
            }
        }
        Command::Containers => {
            let mut cursor = client.list_containers();
            while let Some(container) = cursor.next().await? {
                println!(
                    "{}\t{}\t{}",
                    container.object_count, container.size, container.name
                );
            }
        }
        Command::Stat { container, object } => match object {
            Some(object) => print_json(&client.get_object(&container, &object).await?)?,
            None => print_json(&client.get_container(&container).await?)?,
        },
        Command::CreateContainer { name } => {
            print_json(&client.create_container(&name).await?)?;
        }
        Command::DeleteContainer { name } => {
            client.delete_container(&name).await?;
            tracing::info!("container `{}` deleted", name);
        }
        Command::Delete { container, object } => {
            client.delete_object(&container, &object).await?;
            tracing::info!("object `{}/{}` deleted", container, object);
        }
        Command::Account => {
            print_json(&client.account_info().await?)?;
        }
        Command::CdnEnable { container, ttl } => {
            client.enable_container_cdn(&container, ttl).await?;
            println!("{}", client.get_container_cdn_url(&container).await?);
        }
        Command::CdnUrl { container, object } => {
            let url = match object {
                Some(object) => {
                    client
                        .get_object_cdn_url(&Object::new(container, object))
                        .await?
                }
                None => client.get_container_cdn_url(&container).await?,
            };
            println!("{}", url);
        }
        Command::Website {
            container,
            index,
            error_page,
        } => {
            client.enable_static_website(&container, &index).await?;
            if let Some(error_page) = error_page {
                client.set_error_page(&container, &error_page).await?;
            }
            tracing::info!("container `{}` now serves `{}` as its index", container, index);
        }
    }

    Ok(())
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
